use std::future::Future;
use log::Level;
use wasm_bindgen::prelude::*;


#[wasm_bindgen(module = "/helper.js")]
extern "C" {
    pub fn get_inner_width() -> u32;
    pub fn get_inner_height() -> u32;
    pub fn get_device_pixel_ratio() -> f64;
    pub fn get_time_milliseconds() -> f64;
    fn set_canvas_size(width: u32, height: u32, pixel_width: u32, pixel_height: u32);
}


/// Sends `log` records to the browser console on wasm32 and to env_logger elsewhere.
/// Calling it twice is harmless; the first logger wins.
pub fn init_logging(level: Level) {
    #[cfg(target_arch = "wasm32")]
    {
        if console_log::init_with_level(level).is_err() {
            log::debug!("console logger already installed");
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        if env_logger::Builder::new()
            .filter_level(level.to_level_filter())
            .parse_default_env()
            .try_init()
            .is_err()
        {
            log::debug!("logger already installed");
        }
    }
}


/// Resizes the canvas to `width`x`height` CSS pixels backed by a
/// `pixel_width`x`pixel_height` drawing buffer. No-op off the browser.
#[cfg(target_arch = "wasm32")]
pub fn resize_canvas(width: u32, height: u32, pixel_width: u32, pixel_height: u32) {
    set_canvas_size(width, height, pixel_width, pixel_height);
}

#[cfg(not(target_arch = "wasm32"))]
pub fn resize_canvas(_width: u32, _height: u32, _pixel_width: u32, _pixel_height: u32) {}


/// Enable better error messages if our code ever panics
pub fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}


/// Executes an async Future on the current thread
#[inline(always)]
pub fn execute_future<F: Future<Output = ()> + 'static>(f: F) {
    wasm_bindgen_futures::spawn_local(f);
}


/// Current browser viewport as (width, height, device pixel ratio)
#[cfg(target_arch = "wasm32")]
pub fn browser_viewport() -> Option<(u32, u32, f64)> {
    Some((get_inner_width(), get_inner_height(), get_device_pixel_ratio()))
}

#[cfg(not(target_arch = "wasm32"))]
pub fn browser_viewport() -> Option<(u32, u32, f64)> {
    None
}


/// Check if a float is zero
#[inline(always)]
pub fn is_float_zero(x: f32, threshold: f32) -> bool {
    x.abs() < threshold
}


/// Check if two floats are equal
#[inline(always)]
pub fn are_floats_equal(x: f32, y: f32, threshold: f32) -> bool {
    is_float_zero(x - y, threshold)
}
