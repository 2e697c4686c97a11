//! Interface seam for mapping an intensity value to a color, used by
//! sensors that report range/intensity rather than RGB. Color-map
//! *selection* (rainbow, grayscale, ironbow, ...) is out of scope; this
//! crate only provides the trait boundary and one trivial implementation
//! so the pipeline has something to depend on.

/// Maps a scalar intensity, normalized against some `max_value`, to an
/// RGB triple.
pub trait ColorMap: Send + Sync {
    fn color_for(&self, value: f32, max_value: f32) -> [u8; 3];
}

/// Maps every intensity to mid-gray. A placeholder until a real colormap
/// family is wired in.
#[derive(Default)]
pub struct GrayColorMap;

impl ColorMap for GrayColorMap {
    fn color_for(&self, _value: f32, _max_value: f32) -> [u8; 3] {
        [128, 128, 128]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_colormap_is_constant() {
        let map = GrayColorMap;
        assert_eq!(map.color_for(0.0, 1.0), map.color_for(1.0, 1.0));
    }
}
