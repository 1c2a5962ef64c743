use image::imageops::FilterType;
use image::DynamicImage;

/// Scale to exactly `width` pixels wide, keeping the aspect ratio (Lanczos3).
/// Narrower sources are scaled up.
pub fn resize_to_width(img: &DynamicImage, width: u32) -> DynamicImage {
    let height = target_height(img.width(), img.height(), width);
    img.resize_exact(width, height, FilterType::Lanczos3)
}

fn target_height(src_width: u32, src_height: u32, width: u32) -> u32 {
    if src_width == 0 {
        return 1;
    }
    let height = (src_height as f64 * width as f64 / src_width as f64).round() as u32;
    height.max(1)
}
