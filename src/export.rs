use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use image::{GrayImage, Luma};

use crate::probe::InfluenceMap;

/// Influenced pixels are white, the rest black
pub fn to_image(map: &InfluenceMap) -> GrayImage {
    let (height, width) = map.dim();
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        Luma([(!map.get(y as usize, x as usize) as u8) * 255])
    })
}

/// Writes the map as a grayscale image, the format follows the extension
pub fn save(map: &InfluenceMap, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    to_image(map)
        .save(path)
        .with_context(|| format!("writing receptive field image {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn map() -> InfluenceMap {
        let mut map = InfluenceMap::new(2, 3);
        for r in 0..2 {
            for c in 0..3 {
                map.set(r, c, !(r == 1 && c == 2));
            }
        }
        map
    }

    #[test]
    fn influenced_is_white() {
        let img = to_image(&map());
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 1), &Luma([255]));
        assert_eq!(img.get_pixel(0, 0), &Luma([0]));
        assert_eq!(img.pixels().filter(|p| p.0[0] == 255).count(), 1);
    }

    #[test]
    fn save_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("rf.png");
        save(&map(), &path).unwrap();
        let back = image::open(&path).unwrap().to_luma8();
        assert_eq!(back, to_image(&map()));
    }
}
