use three_d::Viewport;


/// Cached canvas size in CSS pixels plus the pixel ratio the renderer draws at
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportState {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f64,
    max_pixel_ratio: f64,
}
impl ViewportState {
    pub fn new(width: u32, height: u32, device_pixel_ratio: f64, max_pixel_ratio: f64) -> Self {
        Self {
            width,
            height,
            pixel_ratio: capped_pixel_ratio(device_pixel_ratio, max_pixel_ratio),
            max_pixel_ratio,
        }
    }

    /// Applies one resize notification. Returns true if anything changed.
    pub fn resize(&mut self, width: u32, height: u32, device_pixel_ratio: f64) -> bool {
        let pixel_ratio = capped_pixel_ratio(device_pixel_ratio, self.max_pixel_ratio);
        let changed = width != self.width || height != self.height || pixel_ratio != self.pixel_ratio;
        self.width = width;
        self.height = height;
        self.pixel_ratio = pixel_ratio;
        changed
    }

    /// width / height; a zero height is treated as one pixel
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Size of the drawing buffer in device pixels, at the capped ratio
    pub fn physical_size(&self) -> (u32, u32) {
        (
            (self.width as f64 * self.pixel_ratio).round() as u32,
            (self.height as f64 * self.pixel_ratio).round() as u32,
        )
    }

    /// GL viewport covering the whole drawing buffer
    pub fn render_viewport(&self) -> Viewport {
        let (width, height) = self.physical_size();
        Viewport::new_at_origo(width.max(1), height.max(1))
    }
}


/// min(devicePixelRatio, max); non-finite or non-positive ratios count as 1
pub fn capped_pixel_ratio(device_pixel_ratio: f64, max: f64) -> f64 {
    let ratio = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
        device_pixel_ratio
    } else {
        1.0
    };
    ratio.min(max)
}
