//! Asynchronous asset loads.
//!
//! Each load runs as its own future on the browser executor and reports back
//! through a [Bus]; the render loop drains the reader once per frame.

use std::{cell::RefCell, rc::Rc};
use bus::{Bus, BusReader};
use serde::Deserialize;
use three_d::CpuModel;
use three_d_asset::io::RawAssets;

use crate::config::{FontConfig, ModelConfig};
use crate::draco::{self, DracoDecoder, JsDracoDecoder, DRACO_EXTENSION};
use crate::error::LoadError;
use crate::font::TypefaceFont;
use crate::glb::{is_glb, read_glb};
use crate::utils::execute_future;


/// Completion of one asset load, delivered to the scene owner
#[derive(Clone)]
pub enum AssetEvent {
    ModelProgress { path: String, bytes: usize },
    Model { path: String, result: Result<LoadedModel, LoadError> },
    Font { url: String, result: Result<TypefaceFont, LoadError> },
}


#[derive(Clone, Debug)]
pub struct LoadedModel {
    pub model: CpuModel,
    pub summary: GltfSummary,
}


/// What the glTF JSON says about the asset, for logging
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GltfSummary {
    pub version: String,
    pub meshes: usize,
    pub nodes: usize,
    pub extensions_used: Vec<String>,
    /// Draco mesh compression is listed in `extensionsRequired`
    pub requires_draco: bool,
}


#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GltfDocument {
    asset: GltfAsset,
    #[serde(default)]
    extensions_used: Vec<String>,
    #[serde(default)]
    extensions_required: Vec<String>,
    #[serde(default)]
    meshes: Vec<serde_json::Value>,
    #[serde(default)]
    nodes: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct GltfAsset {
    version: String,
}


/// Starts loads on the browser executor and publishes their results
#[derive(Clone)]
pub struct AssetLoader {
    bus: Rc<RefCell<Bus<AssetEvent>>>,
}
impl AssetLoader {
    pub fn new(capacity: usize) -> (Self, BusReader<AssetEvent>) {
        let mut bus = Bus::<AssetEvent>::new(capacity);
        let rx = bus.add_rx();
        (Self { bus: Rc::new(RefCell::new(bus)) }, rx)
    }

    /// Non-blocking; a full bus drops the event
    pub fn publish(&self, event: AssetEvent) {
        if self.bus.borrow_mut().try_broadcast(event).is_err() {
            log::warn!("asset event bus is full, dropping event");
        }
    }

    pub fn load_model(&self, config: &ModelConfig) {
        let loader = self.clone();
        let config = config.clone();
        execute_future(async move { loader.fetch_model(&config).await });
    }

    /// Fetches the model with its dependencies, decodes it and publishes
    /// a progress event followed by the result
    pub async fn fetch_model(&self, config: &ModelConfig) {
        let path = &config.path;
        log::info!("loading model {}", path);
        let decoder = JsDracoDecoder::new(&config.decoder_path);

        let result = match fetch(path).await {
            Ok(mut assets) => {
                let bytes = assets.get(path).map(<[u8]>::len).unwrap_or(0);
                self.publish(AssetEvent::ModelProgress { path: path.clone(), bytes });
                decode_model(path, &mut assets, &decoder).await
            }
            Err(e) => Err(e),
        };
        self.publish(AssetEvent::Model { path: path.clone(), result });
    }

    pub fn load_font(&self, config: &FontConfig) {
        let loader = self.clone();
        let config = config.clone();
        execute_future(async move { loader.fetch_font(&config).await });
    }

    pub async fn fetch_font(&self, config: &FontConfig) {
        let url = &config.url;
        log::info!("loading font {}", url);

        let result = match fetch(url).await {
            Ok(assets) => match assets.get(url) {
                Ok(bytes) => TypefaceFont::from_slice(url, bytes),
                Err(e) => Err(LoadError::Font { url: url.clone(), message: e.to_string() }),
            },
            Err(LoadError::Fetch { message, .. }) => Err(LoadError::Font { url: url.clone(), message }),
            Err(e) => Err(e),
        };
        self.publish(AssetEvent::Font { url: url.clone(), result });
    }
}


/// Fetches `path` and everything it references (glTF buffers and images)
async fn fetch(path: &str) -> Result<RawAssets, LoadError> {
    three_d_asset::io::load_async(&[path]).await.map_err(|e| LoadError::Fetch {
        path: path.to_string(),
        message: e.to_string(),
    })
}


/// Validates the container and reads the glTF JSON.
///
/// Accepts binary glTF (GLB v2) and plain glTF JSON.
pub fn inspect_gltf(path: &str, bytes: &[u8]) -> Result<GltfSummary, LoadError> {
    let format_error = |reason: String| LoadError::Format {
        path: path.to_string(),
        reason,
    };

    let json = if is_glb(bytes) {
        read_glb(bytes).map_err(format_error)?.json
    } else {
        bytes
    };

    let document: GltfDocument = serde_json::from_slice(json).map_err(|e| format_error(e.to_string()))?;
    if !document.asset.version.starts_with('2') {
        return Err(format_error(format!("unsupported glTF version {}", document.asset.version)));
    }

    Ok(GltfSummary {
        version: document.asset.version,
        meshes: document.meshes.len(),
        nodes: document.nodes.len(),
        requires_draco: document.extensions_required.iter().any(|e| e == DRACO_EXTENSION),
        extensions_used: document.extensions_used,
    })
}


/// Inspects, decompresses if needed, then decodes a fetched glTF asset into
/// a CPU-side model. Draco data is only read from a GLB's embedded buffer.
pub async fn decode_model<D: DracoDecoder>(
    path: &str,
    assets: &mut RawAssets,
    decoder: &D,
) -> Result<LoadedModel, LoadError> {
    let bytes = assets.get(path).map_err(|e| LoadError::Fetch {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    let summary = inspect_gltf(path, bytes)?;

    if summary.requires_draco {
        if !is_glb(bytes) {
            return Err(LoadError::UnsupportedCompression {
                path: path.to_string(),
                extension: DRACO_EXTENSION.to_string(),
                decoder_path: decoder.location().to_string(),
            });
        }
        let decompressed = draco::decompress(bytes, decoder).await.map_err(|message| LoadError::Draco {
            path: path.to_string(),
            decoder_path: decoder.location().to_string(),
            message,
        })?;
        assets.insert(path, decompressed);
    }

    let model: CpuModel = assets.deserialize(path).map_err(|e| LoadError::Decode {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    Ok(LoadedModel { model, summary })
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::draco::tests::{draco_glb, TriangleDecoder};
    use crate::glb::write_glb;

    fn glb(json: &str) -> Vec<u8> {
        write_glb(json.as_bytes(), &[])
    }

    fn raw(path: &str, bytes: Vec<u8>) -> RawAssets {
        let mut assets = RawAssets::new();
        assets.insert(path, bytes);
        assets
    }

    #[test]
    fn glb_header_and_json_are_read() {
        let bytes = glb(r#"{"asset":{"version":"2.0"},"meshes":[{},{}],"nodes":[{}],"extensionsUsed":["KHR_materials_unlit"]}"#);
        let summary = inspect_gltf("bar.glb", &bytes).unwrap();
        assert_eq!(summary.version, "2.0");
        assert_eq!(summary.meshes, 2);
        assert_eq!(summary.nodes, 1);
        assert_eq!(summary.extensions_used, vec!["KHR_materials_unlit".to_string()]);
        assert!(!summary.requires_draco);
    }

    #[test]
    fn plain_gltf_json_is_accepted() {
        let summary = inspect_gltf("bar.gltf", br#"{"asset":{"version":"2.0"}}"#).unwrap();
        assert_eq!(summary.meshes, 0);
    }

    #[test]
    fn required_draco_is_flagged() {
        let summary = inspect_gltf("bar.glb", &draco_glb()).unwrap();
        assert!(summary.requires_draco);

        let bytes = glb(r#"{"asset":{"version":"2.0"},"extensionsUsed":["KHR_draco_mesh_compression"]}"#);
        assert!(!inspect_gltf("bar.glb", &bytes).unwrap().requires_draco);
    }

    #[test]
    fn malformed_containers_are_format_errors() {
        let mut truncated = glb(r#"{"asset":{"version":"2.0"}}"#);
        truncated.truncate(24);
        let mut wrong_version = glb(r#"{"asset":{"version":"2.0"}}"#);
        wrong_version[4] = 1;

        for bytes in [truncated, wrong_version, b"not a model".to_vec(), br#"{"asset":{"version":"1.0"}}"#.to_vec()] {
            assert!(matches!(inspect_gltf("bad.glb", &bytes), Err(LoadError::Format { .. })));
        }
    }

    #[test]
    fn draco_model_is_decompressed_before_decoding() {
        let mut assets = raw("models/chocolateBar.glb", draco_glb());
        let loaded = pollster::block_on(decode_model("models/chocolateBar.glb", &mut assets, &TriangleDecoder)).unwrap();

        assert!(loaded.summary.requires_draco);
        assert_eq!(loaded.model.geometries.len(), 1);
        match &loaded.model.geometries[0].geometry {
            three_d_asset::Geometry::Triangles(mesh) => {
                assert_eq!(mesh.vertex_count(), 3);
                assert!(mesh.normals.is_some());
            }
            _ => panic!("expected triangles"),
        }
    }

    #[test]
    fn draco_without_a_working_decoder_names_the_decoder_path() {
        let mut assets = raw("models/chocolateBar.glb", draco_glb());
        let decoder = JsDracoDecoder::new("draco/");
        let err = pollster::block_on(decode_model("models/chocolateBar.glb", &mut assets, &decoder)).unwrap_err();
        assert!(matches!(&err, LoadError::Draco { decoder_path, .. } if decoder_path == "draco/"));
    }

    #[test]
    fn draco_in_plain_gltf_is_unsupported() {
        let json = br#"{"asset":{"version":"2.0"},"extensionsUsed":["KHR_draco_mesh_compression"],"extensionsRequired":["KHR_draco_mesh_compression"]}"#;
        let mut assets = raw("bar.gltf", json.to_vec());
        let err = pollster::block_on(decode_model("bar.gltf", &mut assets, &TriangleDecoder)).unwrap_err();
        assert_eq!(
            err,
            LoadError::UnsupportedCompression {
                path: "bar.gltf".to_string(),
                extension: DRACO_EXTENSION.to_string(),
                decoder_path: "test/".to_string(),
            }
        );
    }

    #[test]
    fn decoding_garbage_fails_without_panicking() {
        let mut assets = raw("bad.glb", vec![0u8; 16]);
        let result = pollster::block_on(decode_model("bad.glb", &mut assets, &TriangleDecoder));
        assert!(result.is_err());
    }

    #[test]
    fn published_events_reach_the_reader() {
        let (loader, mut rx) = AssetLoader::new(4);
        loader.publish(AssetEvent::ModelProgress { path: "bar.glb".to_string(), bytes: 10 });
        match rx.try_recv() {
            Ok(AssetEvent::ModelProgress { bytes, .. }) => assert_eq!(bytes, 10),
            _ => panic!("expected a progress event"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn full_bus_drops_instead_of_blocking() {
        let (loader, mut rx) = AssetLoader::new(1);
        for bytes in 0..3 {
            loader.publish(AssetEvent::ModelProgress { path: "bar.glb".to_string(), bytes });
        }
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
