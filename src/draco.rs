//! `KHR_draco_mesh_compression` support.
//!
//! Compressed primitives are decoded one by one and written back into the GLB
//! as plain accessors, so the result loads like any uncompressed asset. The
//! decoding itself is delegated to a [DracoDecoder]; in the browser that is the
//! Draco JS module found under the configured decoder path.

use serde_json::{json, Map, Value};

use crate::glb::{read_glb, write_glb};


pub const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";

const ARRAY_BUFFER: u64 = 34962;
const ELEMENT_ARRAY_BUFFER: u64 = 34963;
const FLOAT: u64 = 5126;
const UNSIGNED_INT: u64 = 5125;


/// One compressed primitive, ready to hand to a decoder
#[derive(Clone, Debug, PartialEq)]
pub struct DracoPrimitive {
    pub mesh: usize,
    pub primitive: usize,
    pub data: Vec<u8>,
    /// glTF attribute semantic and its Draco unique id
    pub attributes: Vec<(String, u32)>,
}


#[derive(Clone, Debug, PartialEq)]
pub struct DecodedAttribute {
    pub name: String,
    pub components: usize,
    pub values: Vec<f32>,
}


#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedPrimitive {
    pub indices: Vec<u32>,
    pub attributes: Vec<DecodedAttribute>,
}


#[allow(async_fn_in_trait)]
pub trait DracoDecoder {
    /// Where the decoder comes from, for error messages
    fn location(&self) -> &str;

    async fn decode(&self, primitive: &DracoPrimitive) -> Result<DecodedPrimitive, String>;
}


/// The Draco JS decoder (`draco_decoder.js` + `.wasm`) served under a path prefix
pub struct JsDracoDecoder {
    decoder_path: String,
}
impl JsDracoDecoder {
    pub fn new(decoder_path: &str) -> Self {
        Self {
            decoder_path: decoder_path.to_string(),
        }
    }
}

impl DracoDecoder for JsDracoDecoder {
    fn location(&self) -> &str {
        &self.decoder_path
    }

    #[cfg(target_arch = "wasm32")]
    async fn decode(&self, primitive: &DracoPrimitive) -> Result<DecodedPrimitive, String> {
        js::decode(&self.decoder_path, primitive).await
    }

    #[cfg(not(target_arch = "wasm32"))]
    async fn decode(&self, _primitive: &DracoPrimitive) -> Result<DecodedPrimitive, String> {
        Err(format!("the Draco decoder under {} only runs in the browser", self.decoder_path))
    }
}


#[cfg(target_arch = "wasm32")]
mod js {
    use js_sys::{Array, Float32Array, Reflect, Uint32Array};
    use wasm_bindgen::prelude::*;

    use super::{DecodedAttribute, DecodedPrimitive, DracoPrimitive};

    #[wasm_bindgen(module = "/helper.js")]
    extern "C" {
        #[wasm_bindgen(catch)]
        async fn decode_draco(decoder_path: &str, data: &[u8], names: Array, ids: &[u32]) -> Result<JsValue, JsValue>;
    }

    fn field(value: &JsValue, name: &str) -> Result<JsValue, String> {
        Reflect::get(value, &JsValue::from_str(name)).map_err(|e| format!("{:?}", e))
    }

    pub(super) async fn decode(decoder_path: &str, primitive: &DracoPrimitive) -> Result<DecodedPrimitive, String> {
        let names: Array = primitive.attributes.iter().map(|(name, _)| JsValue::from_str(name)).collect();
        let ids: Vec<u32> = primitive.attributes.iter().map(|(_, id)| *id).collect();
        let decoded = decode_draco(decoder_path, &primitive.data, names, &ids)
            .await
            .map_err(|e| e.as_string().unwrap_or_else(|| format!("{:?}", e)))?;

        let indices = Uint32Array::new(&field(&decoded, "indices")?).to_vec();
        let mut attributes = Vec::new();
        for attribute in Array::from(&field(&decoded, "attributes")?).iter() {
            attributes.push(DecodedAttribute {
                name: field(&attribute, "name")?.as_string().unwrap_or_default(),
                components: field(&attribute, "components")?.as_f64().unwrap_or(0.0) as usize,
                values: Float32Array::new(&field(&attribute, "values")?).to_vec(),
            });
        }
        Ok(DecodedPrimitive { indices, attributes })
    }
}


/// Finds every compressed primitive and cuts its data out of the BIN chunk
pub fn draco_primitives(document: &Value, bin: &[u8]) -> Result<Vec<DracoPrimitive>, String> {
    let mut found = Vec::new();
    let meshes = document["meshes"].as_array().map(Vec::as_slice).unwrap_or_default();
    for (m, mesh) in meshes.iter().enumerate() {
        let primitives = mesh["primitives"].as_array().map(Vec::as_slice).unwrap_or_default();
        for (p, primitive) in primitives.iter().enumerate() {
            let Some(extension) = primitive["extensions"].get(DRACO_EXTENSION) else {
                continue;
            };
            let view_index = extension["bufferView"]
                .as_u64()
                .ok_or_else(|| format!("mesh {} primitive {} has no Draco bufferView", m, p))?;
            let data = buffer_view(document, bin, view_index as usize)?.to_vec();

            let mut attributes = Vec::new();
            if let Some(ids) = extension["attributes"].as_object() {
                for (name, id) in ids {
                    let id = id.as_u64().ok_or_else(|| format!("bad Draco id for {}", name))?;
                    attributes.push((name.clone(), id as u32));
                }
            }
            found.push(DracoPrimitive {
                mesh: m,
                primitive: p,
                data,
                attributes,
            });
        }
    }
    Ok(found)
}


fn buffer_view<'a>(document: &Value, bin: &'a [u8], index: usize) -> Result<&'a [u8], String> {
    let view = document["bufferViews"]
        .get(index)
        .ok_or_else(|| format!("bufferView {} does not exist", index))?;
    let buffer = view["buffer"].as_u64().unwrap_or(0) as usize;
    if buffer != 0 || document["buffers"][buffer].get("uri").is_some() {
        return Err(format!("bufferView {} is not in the embedded buffer", index));
    }
    let offset = view["byteOffset"].as_u64().unwrap_or(0) as usize;
    let length = view["byteLength"].as_u64().ok_or("bufferView without byteLength")? as usize;
    let end = offset.checked_add(length).ok_or("bufferView overruns the buffer")?;
    bin.get(offset..end)
        .ok_or_else(|| format!("bufferView {} overruns the buffer", index))
}


fn array_mut<'a>(document: &'a mut Value, key: &str) -> Result<&'a mut Vec<Value>, String> {
    document
        .as_object_mut()
        .ok_or("glTF root is not an object")?
        .entry(key)
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| format!("{} is not an array", key))
}


/// Appends bytes on a four-byte boundary and returns the new bufferView index
fn push_view(document: &mut Value, bin: &mut Vec<u8>, bytes: &[u8], target: u64) -> Result<usize, String> {
    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    let offset = bin.len();
    bin.extend_from_slice(bytes);
    let views = array_mut(document, "bufferViews")?;
    views.push(json!({ "buffer": 0, "byteOffset": offset, "byteLength": bytes.len(), "target": target }));
    Ok(views.len() - 1)
}


fn accessor_type(components: usize) -> Result<&'static str, String> {
    match components {
        1 => Ok("SCALAR"),
        2 => Ok("VEC2"),
        3 => Ok("VEC3"),
        4 => Ok("VEC4"),
        n => Err(format!("unsupported component count {}", n)),
    }
}


/// Largest value of a normalized integer component type
fn normalized_range(component_type: u64) -> Option<f32> {
    match component_type {
        5120 => Some(127.0),
        5121 => Some(255.0),
        5122 => Some(32767.0),
        5123 => Some(65535.0),
        _ => None,
    }
}


/// Points accessor `index` (or a new one) at `view`; returns the accessor index
fn write_accessor(
    document: &mut Value,
    index: Option<usize>,
    view: usize,
    component_type: u64,
    count: usize,
    kind: &str,
    bounds: Option<(Vec<f32>, Vec<f32>)>,
) -> Result<usize, String> {
    let accessors = array_mut(document, "accessors")?;
    let index = match index {
        Some(i) if i < accessors.len() => i,
        Some(i) => return Err(format!("accessor {} does not exist", i)),
        None => {
            accessors.push(Value::Object(Map::new()));
            accessors.len() - 1
        }
    };
    let accessor = accessors[index].as_object_mut().ok_or("accessor is not an object")?;
    accessor.insert("bufferView".into(), json!(view));
    accessor.insert("byteOffset".into(), json!(0));
    accessor.insert("componentType".into(), json!(component_type));
    accessor.insert("count".into(), json!(count));
    accessor.insert("type".into(), json!(kind));
    accessor.remove("normalized");
    accessor.remove("sparse");
    if let Some((min, max)) = bounds {
        accessor.insert("min".into(), json!(min));
        accessor.insert("max".into(), json!(max));
    }
    Ok(index)
}


fn min_max(values: &[f32], components: usize) -> (Vec<f32>, Vec<f32>) {
    let mut min = vec![f32::INFINITY; components];
    let mut max = vec![f32::NEG_INFINITY; components];
    for point in values.chunks_exact(components) {
        for (c, v) in point.iter().enumerate() {
            min[c] = min[c].min(*v);
            max[c] = max[c].max(*v);
        }
    }
    (min, max)
}


/// Replaces one compressed primitive with plain accessors into `bin`
fn apply(document: &mut Value, bin: &mut Vec<u8>, target: &DracoPrimitive, decoded: DecodedPrimitive) -> Result<(), String> {
    let pointer = format!("/meshes/{}/primitives/{}", target.mesh, target.primitive);
    let primitive = document.pointer(&pointer).ok_or("primitive disappeared")?;
    let indices_accessor = primitive["indices"].as_u64().map(|i| i as usize);
    let attribute_accessors: Map<String, Value> = primitive["attributes"].as_object().cloned().unwrap_or_default();

    let index_bytes: Vec<u8> = decoded.indices.iter().flat_map(|i| i.to_le_bytes()).collect();
    let view = push_view(document, bin, &index_bytes, ELEMENT_ARRAY_BUFFER)?;
    let indices = write_accessor(document, indices_accessor, view, UNSIGNED_INT, decoded.indices.len(), "SCALAR", None)?;

    let mut attributes = Map::new();
    for attribute in decoded.attributes {
        if attribute.components == 0 || attribute.values.len() % attribute.components != 0 {
            return Err(format!("{} decoded to a ragged array", attribute.name));
        }
        let existing = attribute_accessors.get(&attribute.name).and_then(Value::as_u64).map(|i| i as usize);

        let mut values = attribute.values;
        let declared = existing.and_then(|i| document["accessors"].get(i)).cloned().unwrap_or(Value::Null);
        if declared["normalized"].as_bool() == Some(true) {
            if let Some(range) = declared["componentType"].as_u64().and_then(normalized_range) {
                values.iter_mut().for_each(|v| *v /= range);
            }
        }

        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let view = push_view(document, bin, &bytes, ARRAY_BUFFER)?;
        let count = values.len() / attribute.components;
        let bounds = (attribute.name == "POSITION").then(|| min_max(&values, attribute.components));
        let kind = accessor_type(attribute.components)?;
        let accessor = write_accessor(document, existing, view, FLOAT, count, kind, bounds)?;
        attributes.insert(attribute.name, json!(accessor));
    }

    let primitive = document
        .pointer_mut(&pointer)
        .and_then(Value::as_object_mut)
        .ok_or("primitive disappeared")?;
    primitive.insert("indices".into(), json!(indices));
    if let Some(Value::Object(existing)) = primitive.get_mut("attributes") {
        existing.extend(attributes);
    } else {
        primitive.insert("attributes".into(), Value::Object(attributes));
    }
    let empty = match primitive.get_mut("extensions").and_then(Value::as_object_mut) {
        Some(extensions) => {
            extensions.remove(DRACO_EXTENSION);
            extensions.is_empty()
        }
        None => false,
    };
    if empty {
        primitive.remove("extensions");
    }
    Ok(())
}


fn strip_extension(document: &mut Value) {
    let Some(root) = document.as_object_mut() else { return };
    for key in ["extensionsUsed", "extensionsRequired"] {
        let empty = match root.get_mut(key).and_then(Value::as_array_mut) {
            Some(list) => {
                list.retain(|e| e.as_str() != Some(DRACO_EXTENSION));
                list.is_empty()
            }
            None => false,
        };
        if empty {
            root.remove(key);
        }
    }
}


/// Rewrites a Draco-compressed GLB as an uncompressed GLB
pub async fn decompress<D: DracoDecoder>(bytes: &[u8], decoder: &D) -> Result<Vec<u8>, String> {
    let chunks = read_glb(bytes)?;
    let mut document: Value = serde_json::from_slice(chunks.json).map_err(|e| e.to_string())?;
    let mut bin = chunks.bin.map(<[u8]>::to_vec).unwrap_or_default();

    let primitives = draco_primitives(&document, &bin)?;
    log::debug!("decoding {} Draco primitives with {}", primitives.len(), decoder.location());
    for primitive in &primitives {
        let decoded = decoder.decode(primitive).await?;
        apply(&mut document, &mut bin, primitive, decoded)?;
    }
    strip_extension(&mut document);

    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    let buffers = array_mut(&mut document, "buffers")?;
    match buffers.first_mut().and_then(Value::as_object_mut) {
        Some(buffer) => {
            buffer.insert("byteLength".into(), json!(bin.len()));
        }
        None => buffers.push(json!({ "byteLength": bin.len() })),
    }

    let json = serde_json::to_vec(&document).map_err(|e| e.to_string())?;
    Ok(write_glb(&json, &bin))
}


#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Answers every request with the same triangle
    pub(crate) struct TriangleDecoder;

    impl DracoDecoder for TriangleDecoder {
        fn location(&self) -> &str {
            "test/"
        }

        async fn decode(&self, primitive: &DracoPrimitive) -> Result<DecodedPrimitive, String> {
            let mut attributes = Vec::new();
            for (name, _) in &primitive.attributes {
                let (components, values) = match name.as_str() {
                    "POSITION" => (3, vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0, 0.0]),
                    "NORMAL" => (3, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]),
                    "COLOR_0" => (3, vec![255.0, 0.0, 0.0, 0.0, 255.0, 0.0, 0.0, 0.0, 255.0]),
                    _ => return Err(format!("unexpected attribute {}", name)),
                };
                attributes.push(DecodedAttribute {
                    name: name.clone(),
                    components,
                    values,
                });
            }
            Ok(DecodedPrimitive {
                indices: vec![0, 1, 2],
                attributes,
            })
        }
    }

    /// A one-triangle GLB whose only primitive is Draco compressed
    pub(crate) fn draco_glb() -> Vec<u8> {
        let document = json!({
            "asset": { "version": "2.0" },
            "extensionsUsed": [DRACO_EXTENSION],
            "extensionsRequired": [DRACO_EXTENSION],
            "scene": 0,
            "scenes": [{ "nodes": [0] }],
            "nodes": [{ "mesh": 0, "name": "bar" }],
            "meshes": [{
                "primitives": [{
                    "attributes": { "POSITION": 0, "NORMAL": 1, "COLOR_0": 2 },
                    "indices": 3,
                    "extensions": {
                        DRACO_EXTENSION: { "bufferView": 0, "attributes": { "POSITION": 0, "NORMAL": 1, "COLOR_0": 2 } }
                    }
                }]
            }],
            "buffers": [{ "byteLength": 8 }],
            "bufferViews": [{ "buffer": 0, "byteOffset": 0, "byteLength": 8 }],
            "accessors": [
                { "componentType": 5126, "count": 3, "type": "VEC3", "min": [0, 0, 0], "max": [1, 2, 0] },
                { "componentType": 5126, "count": 3, "type": "VEC3" },
                { "componentType": 5121, "normalized": true, "count": 3, "type": "VEC3" },
                { "componentType": 5125, "count": 3, "type": "SCALAR" }
            ]
        });
        write_glb(document.to_string().as_bytes(), b"DRACOxyz")
    }

    #[test]
    fn compressed_primitives_are_found_with_their_data() {
        let bytes = draco_glb();
        let chunks = read_glb(&bytes).unwrap();
        let document: Value = serde_json::from_slice(chunks.json).unwrap();
        let found = draco_primitives(&document, chunks.bin.unwrap()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].data, b"DRACOxyz");
        assert!(found[0].attributes.contains(&("POSITION".to_string(), 0)));
    }

    #[test]
    fn decompressed_glb_has_plain_accessors() {
        let bytes = pollster::block_on(decompress(&draco_glb(), &TriangleDecoder)).unwrap();
        let chunks = read_glb(&bytes).unwrap();
        let document: Value = serde_json::from_slice(chunks.json).unwrap();
        let bin = chunks.bin.unwrap();

        assert!(document.get("extensionsRequired").is_none());
        assert!(document.get("extensionsUsed").is_none());
        let primitive = &document["meshes"][0]["primitives"][0];
        assert!(primitive.get("extensions").is_none());

        let position = &document["accessors"][0];
        assert_eq!(position["componentType"], json!(FLOAT));
        assert_eq!(position["max"], json!([1.0, 2.0, 0.0]));
        let view = &document["bufferViews"][position["bufferView"].as_u64().unwrap() as usize];
        let offset = view["byteOffset"].as_u64().unwrap() as usize;
        let y = f32::from_le_bytes(bin[offset + 28..offset + 32].try_into().unwrap());
        assert_eq!(y, 2.0);

        let color = &document["accessors"][2];
        assert!(color.get("normalized").is_none());
        let view = &document["bufferViews"][color["bufferView"].as_u64().unwrap() as usize];
        let offset = view["byteOffset"].as_u64().unwrap() as usize;
        let red = f32::from_le_bytes(bin[offset..offset + 4].try_into().unwrap());
        assert_eq!(red, 1.0);

        assert_eq!(document["accessors"][3]["componentType"], json!(UNSIGNED_INT));
        assert_eq!(document["buffers"][0]["byteLength"], json!(bin.len()));
    }

    #[test]
    fn decoder_failures_are_reported() {
        let decoder = JsDracoDecoder::new("draco/");
        let err = pollster::block_on(decompress(&draco_glb(), &decoder)).unwrap_err();
        assert!(err.contains("draco/"), "{}", err);
    }

    #[test]
    fn compressed_data_outside_the_bin_chunk_is_rejected() {
        let document = json!({
            "meshes": [{ "primitives": [{ "extensions": { DRACO_EXTENSION: { "bufferView": 0, "attributes": {} } } }] }],
            "buffers": [{ "byteLength": 64 }],
            "bufferViews": [{ "buffer": 0, "byteOffset": 32, "byteLength": 32 }]
        });
        let err = draco_primitives(&document, &[0u8; 16]).unwrap_err();
        assert!(err.contains("overruns"), "{}", err);
    }
}
