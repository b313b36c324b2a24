use super::DataSerializer;
use crate::Result;

/// UTF-8 text; round-trips exactly
#[derive(Debug, Default, Clone, Copy)]
pub struct StringSerializer;

impl DataSerializer<String> for StringSerializer {
    fn serialize(
        &self,
        value: &String,
    ) -> Result<Vec<u8>> {
        Ok(value.as_bytes().to_vec())
    }

    fn deserialize(
        &self,
        bytes: &[u8],
    ) -> Result<String> {
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}
