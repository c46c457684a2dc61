//! Prints the Bucket, Policy and User CRDs as one multi-document YAML stream.
//!
//! ```sh
//! cargo run --bin crdgen > config/crd/minio-operator.yaml
//! ```

use kube::CustomResourceExt;
use minio_operator::{Bucket, Policy, User};

fn main() -> anyhow::Result<()> {
    let crds = [Bucket::crd(), Policy::crd(), User::crd()];
    let mut documents = Vec::with_capacity(crds.len());
    for crd in &crds {
        documents.push(serde_yaml::to_string(crd)?);
    }
    print!("{}", documents.join("---\n"));
    Ok(())
}
