//! Configuration tests

use super::*;
use serial_test::serial;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_default_config() {
    let config = BenchConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.shape, Conv2dShape::default());
    assert_eq!(config.gemm.scalar, GemmBlocking::new(32, 32, 32));
    assert_eq!(config.gemm.vector, GemmBlocking::new(8, 64, 32));
    assert_eq!(config.run.lane_widths, LaneWidth::ALL.to_vec());
    assert_eq!(config.run.tolerance, 1e-4);
}

#[test]
fn test_config_builder() {
    let shape = Conv2dShape::new(2, 4, 8, (16, 16), (3, 3), (1, 1), (0, 0)).unwrap();
    let config = BenchConfig::builder()
        .shape(shape)
        .seed(42)
        .batch_rows(2)
        .lane_widths(vec![LaneWidth::M4, LaneWidth::M8])
        .log_format("json")
        .build()
        .unwrap();

    assert_eq!(config.shape.batch, 2);
    assert_eq!(config.run.seed, 42);
    assert_eq!(config.run.batch_rows, 2);
    assert_eq!(config.run.lane_widths, vec![LaneWidth::M4, LaneWidth::M8]);
    assert_eq!(config.logging.format, "json");
}

#[test]
fn test_config_validation() {
    let mut config = BenchConfig::default();
    config.shape.stride_h = 0;
    assert!(config.validate().is_err());

    config = BenchConfig::default();
    config.run.tolerance = 0.0;
    assert!(config.validate().is_err());

    config = BenchConfig::default();
    config.run.tolerance = f32::NAN;
    assert!(config.validate().is_err());

    config = BenchConfig::default();
    config.run.batch_rows = 0;
    assert!(config.validate().is_err());

    config = BenchConfig::default();
    config.gemm.vector.block_k = 0;
    assert!(config.validate().is_err());

    config = BenchConfig::default();
    config.logging.format = "xml".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_partial_toml_uses_defaults() {
    let config = BenchConfig::from_toml_str(
        r#"
        [shape]
        in_h = 16
        in_w = 12
        pad_h = 0
        pad_w = 0

        [run]
        seed = 7
        lane_widths = ["m2", "m8"]
        "#,
    )
    .unwrap();

    assert_eq!(config.shape.in_h, 16);
    assert_eq!(config.shape.in_w, 12);
    assert_eq!(config.shape.kernel_h, 3);
    assert_eq!(config.run.seed, 7);
    assert_eq!(config.run.lane_widths, vec![LaneWidth::M2, LaneWidth::M8]);
    assert_eq!(config.gemm, GemmConfig::default());
}

#[test]
fn test_invalid_toml_shape_rejected() {
    let result = BenchConfig::from_toml_str(
        r#"
        [shape]
        in_h = 2
        pad_h = 0
        "#,
    );
    assert!(result.is_err());
}

#[test]
fn test_config_file_round_trip() {
    let config = BenchConfig::builder().seed(99).tolerance(5e-5).build().unwrap();
    let toml = config.to_toml_string().unwrap();

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(toml.as_bytes()).unwrap();

    let loaded = BenchConfig::from_file(file.path()).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_missing_file_is_io_error() {
    let err = BenchConfig::from_file("/definitely/not/here/rvvbench.toml").unwrap_err();
    assert!(matches!(err, RvvBenchError::Io(_)));
}

#[test]
#[serial]
fn test_env_overrides() {
    temp_env::with_vars(
        [
            ("RVVBENCH_SEED", Some("1234")),
            ("RVVBENCH_TOLERANCE", Some("0.001")),
            ("RVVBENCH_OUTPUT_DIR", Some("/tmp/rvvbench-out")),
            ("RVVBENCH_LOG_LEVEL", Some("debug")),
        ],
        || {
            let mut config = BenchConfig::default();
            config.apply_env_overrides().unwrap();
            assert_eq!(config.run.seed, 1234);
            assert_eq!(config.run.tolerance, 0.001);
            assert_eq!(config.run.output_dir, PathBuf::from("/tmp/rvvbench-out"));
            assert_eq!(config.logging.level, "debug");
        },
    );
}

#[test]
#[serial]
fn test_env_override_rejects_garbage() {
    temp_env::with_var("RVVBENCH_SEED", Some("not-a-number"), || {
        let mut config = BenchConfig::default();
        assert!(config.apply_env_overrides().is_err());
    });
}
