//! blobworm-azure
//!
//! Production `ContainerClient`/`BlobClient` over the Azure Blob REST API.
//!
//! The community SDK does not expose blob immutability policies, so this
//! crate talks to the service directly: Shared Key signing, a small request
//! pipeline on `reqwest`, and `quick-xml` for listing and error bodies.
//!
//! ```ignore
//! let target = ContainerTarget::from_env()?;
//! let container = AzureContainerClient::connect(&target, &ClientSettings::default()).await?;
//! let blobs = container.list_blobs().await?;
//! ```

mod auth;
mod blob;
mod container;
mod pipeline;
mod settings;
mod xml;

pub use auth::SharedKeyCredential;
pub use blob::AzureBlobClient;
pub use container::AzureContainerClient;
pub use settings::{API_VERSION, BLOB_ENDPOINT_SUFFIX, ClientSettings};
