use lector_base::Vec2;
use lector_image::{Image, PixelFormat, adjust_contrast, otsu_threshold, resize, sharpen};

fn gray(width: usize, height: usize, data: Vec<u8>) -> Image {
    Image::new(Vec2::new(width, height), data, PixelFormat::Gray8).unwrap()
}

#[test]
fn test_contrast_saturates() {
    let image = gray(4, 1, vec![0, 10, 100, 200]);
    let out = adjust_contrast(&image, 1.5, 30.0).unwrap();
    assert_eq!(out.data, vec![30, 45, 180, 255]);
}

#[test]
fn test_contrast_takes_absolute_value() {
    let image = gray(2, 1, vec![0, 100]);
    let out = adjust_contrast(&image, 1.0, -50.0).unwrap();
    assert_eq!(out.data, vec![50, 50]);
}

#[test]
fn test_contrast_rejects_rgb() {
    let rgb = Image::zeros(Vec2::new(2, 2), PixelFormat::Rgb8).unwrap();
    assert!(adjust_contrast(&rgb, 1.5, 30.0).is_err());
}

#[test]
fn test_sharpen_flat_image_unchanged() {
    let image = gray(5, 4, vec![77; 20]);
    let out = sharpen(&image).unwrap();
    assert_eq!(out.data, image.data);
}

#[test]
fn test_sharpen_amplifies_edge() {
    // dark left half, bright right half
    let mut data = Vec::new();
    for _ in 0..3 {
        data.extend_from_slice(&[50, 50, 150, 150]);
    }
    let image = gray(4, 3, data);
    let out = sharpen(&image).unwrap();

    // pixels next to the edge are pushed apart
    assert!(out.data[1] < 50);
    assert!(out.data[2] > 150);
    // pixels away from the edge stay put
    assert_eq!(out.data[0], 50);
    assert_eq!(out.data[3], 150);
}

#[test]
fn test_sharpen_single_pixel() {
    let image = gray(1, 1, vec![10]);
    let out = sharpen(&image).unwrap();
    assert_eq!(out.data, vec![10]);
}

#[test]
fn test_otsu_splits_bimodal() {
    let mut data = vec![20u8; 50];
    data.extend(vec![220u8; 50]);
    let image = gray(10, 10, data);

    let (threshold, binary) = otsu_threshold(&image).unwrap();
    assert!((20..220).contains(&threshold));
    assert!(binary.data[..50].iter().all(|&v| v == 0));
    assert!(binary.data[50..].iter().all(|&v| v == 255));
}

#[test]
fn test_otsu_uniform_image() {
    let image = gray(3, 3, vec![128; 9]);
    let (_, binary) = otsu_threshold(&image).unwrap();
    assert!(binary.data.iter().all(|&v| v == 0));
}

#[test]
fn test_resize_rgb() {
    let image = Image::zeros(Vec2::new(1280, 720), PixelFormat::Rgb8).unwrap();
    let small = resize(&image, Vec2::new(640, 360)).unwrap();
    assert_eq!(small.shape(), [360, 640, 3]);
    assert_eq!(small.data.len(), 640 * 360 * 3);
}
