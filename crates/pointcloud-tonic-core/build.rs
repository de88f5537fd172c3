/// Builds the gRPC client and server code for the `pointcloud.proto`
/// definition using `tonic-prost-build`.
///
/// The file descriptor set is emitted alongside the generated code so the
/// server can register gRPC reflection.
///
/// Generated code is accessible in Rust via:
///
/// ```rust
/// pub mod proto {
///     tonic::include_proto!("pointcloud");
/// }
/// ```
use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("pointcloud_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/pointcloud.proto"], &["proto"])
        .unwrap();
}
