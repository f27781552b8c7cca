//! filegen-api: Shared protocol types
//!
//! Contains the content hash, machine identity, the request/response messages
//! exchanged with file generator sources, and the frame codec used on the wire.

pub mod codec;
pub mod error;
pub mod hash;
pub mod machine;
pub mod requests;
pub mod responses;

pub use codec::{ClientCodec, JsonCodec, ServerCodec};
pub use error::ProtoError;
pub use hash::Hash;
pub use machine::MachineInfo;
pub use requests::{ClientRequest, GetObjectRequest, YieldRequest};
pub use responses::{FileInfo, GetObjectResponse, ServerMessage, YieldResponse};
