//! Binary glTF (GLB v2) container: a 12-byte header, a JSON chunk and an
//! optional BIN chunk. Chunk lengths are multiples of four.

pub const GLB_MAGIC: u32 = 0x4654_6C67; // "glTF"
pub const CHUNK_JSON: u32 = 0x4E4F_534A; // "JSON"
pub const CHUNK_BIN: u32 = 0x004E_4942; // "BIN\0"


/// Borrowed chunks of one GLB file
#[derive(Debug, PartialEq)]
pub struct GlbChunks<'a> {
    pub json: &'a [u8],
    pub bin: Option<&'a [u8]>,
}


pub fn is_glb(bytes: &[u8]) -> bool {
    read_u32(bytes, 0) == Some(GLB_MAGIC)
}


fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let b = bytes.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}


/// Reads chunk `(type, data)` starting at `offset`; returns it with the offset of the next chunk
fn read_chunk(bytes: &[u8], offset: usize) -> Result<(u32, &[u8], usize), String> {
    let len = read_u32(bytes, offset).ok_or("truncated chunk header")? as usize;
    let kind = read_u32(bytes, offset + 4).ok_or("truncated chunk header")?;
    let start = offset + 8;
    let end = start.checked_add(len).ok_or("chunk overruns the file")?;
    let data = bytes.get(start..end).ok_or("chunk overruns the file")?;
    Ok((kind, data, end))
}


pub fn read_glb(bytes: &[u8]) -> Result<GlbChunks<'_>, String> {
    if !is_glb(bytes) {
        return Err("missing glTF magic".to_string());
    }
    let version = read_u32(bytes, 4).ok_or("truncated GLB header")?;
    if version != 2 {
        return Err(format!("unsupported GLB version {}", version));
    }
    let total = read_u32(bytes, 8).ok_or("truncated GLB header")? as usize;
    if total > bytes.len() {
        return Err(format!("GLB declares {} bytes but only {} were read", total, bytes.len()));
    }
    let bytes = &bytes[..total];

    let (kind, json, next) = read_chunk(bytes, 12).map_err(|e| format!("JSON {}", e))?;
    if kind != CHUNK_JSON {
        return Err("first GLB chunk is not JSON".to_string());
    }
    let bin = if next < bytes.len() {
        let (kind, data, _) = read_chunk(bytes, next).map_err(|e| format!("BIN {}", e))?;
        (kind == CHUNK_BIN).then_some(data)
    } else {
        None
    };
    Ok(GlbChunks { json, bin })
}


/// Pads the JSON with spaces and the binary data with zeros
pub fn write_glb(json: &[u8], bin: &[u8]) -> Vec<u8> {
    let padded = |len: usize| (len + 3) & !3;
    let json_len = padded(json.len());
    let bin_len = padded(bin.len());
    let mut total = 12 + 8 + json_len;
    if !bin.is_empty() {
        total += 8 + bin_len;
    }

    let mut bytes = Vec::with_capacity(total);
    bytes.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    bytes.extend_from_slice(&2u32.to_le_bytes());
    bytes.extend_from_slice(&(total as u32).to_le_bytes());
    bytes.extend_from_slice(&(json_len as u32).to_le_bytes());
    bytes.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    bytes.extend_from_slice(json);
    bytes.resize(20 + json_len, b' ');
    if !bin.is_empty() {
        bytes.extend_from_slice(&(bin_len as u32).to_le_bytes());
        bytes.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        bytes.extend_from_slice(bin);
        bytes.resize(total, 0);
    }
    bytes
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_are_padded_and_read_back() {
        let bytes = write_glb(br#"{"a":1}"#, &[1, 2, 3, 4, 5]);
        assert_eq!(bytes.len() % 4, 0);
        assert_eq!(read_u32(&bytes, 8), Some(bytes.len() as u32));

        let chunks = read_glb(&bytes).unwrap();
        assert_eq!(chunks.json, b"{\"a\":1} ");
        assert_eq!(chunks.bin, Some(&[1u8, 2, 3, 4, 5, 0, 0, 0][..]));
    }

    #[test]
    fn json_only_files_have_no_bin_chunk() {
        let bytes = write_glb(b"{}", &[]);
        assert_eq!(read_glb(&bytes).unwrap().bin, None);
    }

    #[test]
    fn huge_chunk_length_is_rejected_instead_of_wrapping() {
        let mut bytes = write_glb(b"{}", &[]);
        bytes[12..16].copy_from_slice(&u32::MAX.to_le_bytes());
        let err = read_glb(&bytes).unwrap_err();
        assert!(err.contains("overruns"), "{}", err);

        let err = read_chunk(&bytes, usize::MAX - 8).unwrap_err();
        assert!(err.contains("truncated"), "{}", err);
    }
}
