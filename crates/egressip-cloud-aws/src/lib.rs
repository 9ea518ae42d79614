//! AWS EC2 cloud backend for egress IPs
//!
//! Egress IPs are secondary private addresses on the first network interface
//! of the EC2 instance backing a cluster host. Hosts are resolved by their
//! private DNS name.
//!
//! EC2 is reached through the narrow [`Ec2Api`] seam. [`SdkEc2Api`] is the
//! production implementation on top of `aws-sdk-ec2`.

pub mod ec2;
pub mod provider;

pub use ec2::{AssignRequest, Ec2Api, Ec2Instance, Ec2Interface, SdkEc2Api};
pub use provider::AwsCloudBackend;
