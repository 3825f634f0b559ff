//! Avro values framed with a schema-registry id.

mod codec;
mod convert;

pub use codec::{AvroCodec, HEADER_LEN, MAGIC_BYTE, frame, unframe};
