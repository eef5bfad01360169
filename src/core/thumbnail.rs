use image::{DynamicImage, GenericImageView, imageops::FilterType};

pub const DEFAULT_THUMBNAIL_SIZE: u32 = 200;

/// Dimensions that fit `(width, height)` inside a `bound`×`bound` box,
/// keeping the aspect ratio and never enlarging the source.
pub fn fit_dimensions(width: u32, height: u32, bound: u32) -> (u32, u32) {
    if width <= bound && height <= bound {
        return (width, height);
    }

    if width > height {
        let scaled = height as f64 * bound as f64 / width as f64;
        (bound, (scaled.round() as u32).max(1))
    } else {
        let scaled = width as f64 * bound as f64 / height as f64;
        ((scaled.round() as u32).max(1), bound)
    }
}

/// Resample `img` to an aspect-fit thumbnail no larger than `bound`.
pub fn render_thumbnail(img: DynamicImage, bound: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    let (new_width, new_height) = fit_dimensions(width, height, bound);
    if (new_width, new_height) == (width, height) {
        return img;
    }

    img.resize_exact(new_width, new_height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
            let intensity = ((x + y) % 256) as u8;
            Rgb([intensity, intensity, intensity])
        }))
    }

    #[test]
    fn test_landscape_is_bounded_by_width() {
        let thumb = render_thumbnail(gradient(1920, 1080), DEFAULT_THUMBNAIL_SIZE);
        let (w, h) = thumb.dimensions();
        assert_eq!(w, 200);
        assert_eq!(h, 113);
    }

    #[test]
    fn test_portrait_is_bounded_by_height() {
        let thumb = render_thumbnail(gradient(1080, 1920), DEFAULT_THUMBNAIL_SIZE);
        let (w, h) = thumb.dimensions();
        assert_eq!(h, 200);
        assert!(w < 200);
    }

    #[test]
    fn test_small_images_are_not_upscaled() {
        let thumb = render_thumbnail(gradient(64, 32), DEFAULT_THUMBNAIL_SIZE);
        assert_eq!(thumb.dimensions(), (64, 32));
    }

    #[test]
    fn test_extreme_aspect_keeps_one_pixel() {
        assert_eq!(fit_dimensions(10_000, 2, 200), (200, 1));
        assert_eq!(fit_dimensions(300, 300, 200), (200, 200));
    }
}
