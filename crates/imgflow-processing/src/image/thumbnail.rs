use image::imageops::FilterType;
use image::DynamicImage;

/// Centre-crop to a square and scale to `size`×`size`.
pub fn square_thumbnail(img: &DynamicImage, size: u32) -> DynamicImage {
    img.resize_to_fill(size, size, FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, RgbImage};

    #[test]
    fn always_square() {
        for (w, h) in [(500, 500), (640, 200), (30, 900), (50, 50)] {
            let img = DynamicImage::ImageRgb8(RgbImage::new(w, h));
            assert_eq!(square_thumbnail(&img, 100).dimensions(), (100, 100));
        }
    }
}
