pub mod error;
pub mod plex;
pub mod traits;

pub use error::ServerError;
pub use plex::PlexServer;
pub use traits::{CollectionInfo, MediaServer, PlaylistInfo, SectionInfo, SectionKind, ServerIdentity};
