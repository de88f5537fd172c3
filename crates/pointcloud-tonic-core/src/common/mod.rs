pub mod error;
pub mod types;

pub use error::*;

pub mod proto {
    tonic::include_proto!("pointcloud");

    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("pointcloud_descriptor");
}
