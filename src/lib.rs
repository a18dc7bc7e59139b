use log::Level;
use wasm_bindgen::prelude::*;

pub mod animate;
pub mod config;
pub mod controls;
pub mod draco;
pub mod error;
pub mod font;
pub mod glb;
pub mod loader;
pub mod scene;
pub mod shape;
pub mod stage;
pub mod text;
pub mod utils;
pub mod viewport;
mod renderer;

use config::SceneConfig;
use error::AppError;


#[wasm_bindgen(start)]
pub fn dummy_main() {
}


/// Shows the chocolate-bar scene
#[wasm_bindgen]
pub async fn run() -> Result<(), JsValue> {
    start(None).await
}


/// Shows a scene variant described by a JSON override of the default configuration
#[wasm_bindgen]
pub async fn run_with_config(json: String) -> Result<(), JsValue> {
    start(Some(&json)).await
}


async fn start(json: Option<&str>) -> Result<(), JsValue> {
    utils::set_panic_hook();
    utils::init_logging(Level::Info);
    let config = scene_config(json).map_err(to_js_error)?;
    renderer::main(config).await.map_err(to_js_error)
}


/// The default scene, or the default with `json` merged over it
fn scene_config(json: Option<&str>) -> Result<SceneConfig, AppError> {
    match json {
        Some(json) => Ok(SceneConfig::from_json(json)?),
        None => Ok(SceneConfig::default()),
    }
}


fn to_js_error(e: AppError) -> JsValue {
    log::error!("{}", e);
    js_sys::Error::new(&e.to_string()).into()
}
