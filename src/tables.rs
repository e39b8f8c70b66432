//! Precomputed luma/chroma lookup tables for YUYV-to-RGB conversion.
//!
//! Four 256x256 tables cover every (luma, chroma) pair: clamped red and
//! blue channels plus two signed green contributions that are summed and
//! clamped per output pixel. Construction happens at most once per process;
//! every conversion call goes through [`tables`], so first use builds the
//! tables and later uses are no-ops.

use std::sync::OnceLock;

/// Red contribution of the V chroma channel.
const RED_FROM_V: f64 = 1.370705;
/// Blue contribution of the U chroma channel.
const BLUE_FROM_U: f64 = 1.732446;
/// Green contribution subtracted per V unit.
const GREEN_FROM_V: f64 = 0.698001;
/// Green contribution subtracted per U unit.
const GREEN_FROM_U: f64 = 0.337633;

static TABLES: OnceLock<LookupTables> = OnceLock::new();

/// Shared table singleton; builds on first call.
pub(crate) fn tables() -> &'static LookupTables {
    TABLES.get_or_init(LookupTables::build)
}

/// Immutable conversion tables indexed `[luma][chroma]`.
pub(crate) struct LookupTables {
    red: Vec<[u8; 256]>,
    blue: Vec<[u8; 256]>,
    green_v: Vec<[i32; 256]>,
    green_u: Vec<[i32; 256]>,
}

impl LookupTables {
    /// Fills all four tables. Arithmetic runs in `f64` and is truncated
    /// toward zero on integer conversion; red and blue saturate to
    /// `[0, 255]`, the green halves stay signed until summed.
    #[allow(clippy::cast_possible_truncation)]
    fn build() -> Self {
        let mut red = vec![[0_u8; 256]; 256];
        let mut blue = vec![[0_u8; 256]; 256];
        let mut green_v = vec![[0_i32; 256]; 256];
        let mut green_u = vec![[0_i32; 256]; 256];

        for luma in 0..256_i32 {
            let half_luma = f64::from(luma / 2);
            for chroma in 0..256_i32 {
                let centered = f64::from(chroma - 128);
                let (row, col) = (luma as usize, chroma as usize);
                red[row][col] = clamp_u8((f64::from(luma) + RED_FROM_V * centered) as i32);
                blue[row][col] = clamp_u8((f64::from(luma) + BLUE_FROM_U * centered) as i32);
                green_v[row][col] = (half_luma - GREEN_FROM_V * centered) as i32;
                green_u[row][col] = (half_luma - GREEN_FROM_U * centered) as i32;
            }
        }

        Self {
            red,
            blue,
            green_v,
            green_u,
        }
    }

    /// Converts one (Y, U, V) triple to an `[r, g, b]` pixel.
    pub(crate) fn rgb(&self, y: u8, u: u8, v: u8) -> [u8; 3] {
        let (y, u, v) = (usize::from(y), usize::from(u), usize::from(v));
        let green = self.green_u[y][u] + self.green_v[y][v];
        [self.red[y][v], clamp_u8(green), self.blue[y][u]]
    }
}

/// Saturates to `[0, 255]`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn clamp_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn red_and_blue_saturate_at_the_extremes() {
        let t = tables();
        // 0 + 1.370705 * -128 and 0 + 1.732446 * -128 both clamp to 0.
        assert_eq!(t.red[0][0], 0);
        assert_eq!(t.blue[0][0], 0);
        // 255 + 1.370705 * 127 = 429.07 clamps to 255.
        assert_eq!(t.red[255][255], 255);
        assert_eq!(t.blue[255][255], 255);
    }

    #[test]
    fn neutral_chroma_passes_luma_through() {
        let t = tables();
        assert_eq!(t.red[128][128], 128);
        assert_eq!(t.blue[128][128], 128);
        assert_eq!(t.green_v[128][128], 64);
        assert_eq!(t.green_u[128][128], 64);
    }

    #[test]
    fn green_halves_truncate_toward_zero() {
        let t = tables();
        // 0 - 0.337633 * 1 = -0.337633 truncates to 0, not -1.
        assert_eq!(t.green_u[0][129], 0);
        // 0 + 0.337633 * 128 = 43.217 truncates to 43.
        assert_eq!(t.green_u[0][0], 43);
        assert_eq!(t.green_v[0][0], 89);
        // Integer luma halving: 1 / 2 = 0.
        assert_eq!(t.green_v[1][128], 0);
    }

    #[test]
    fn rgb_matches_the_closed_form_points() {
        let t = tables();
        // All-zero macropixel: green = 43 + 89 = 132.
        assert_eq!(t.rgb(0, 0, 0), [0, 132, 0]);
        assert_eq!(t.rgb(128, 128, 128), [128, 128, 128]);
        // 255 luma, full chroma: green halves 84 + 38 = 122.
        assert_eq!(t.rgb(255, 255, 255), [255, 122, 255]);
    }

    #[test]
    fn repeated_access_returns_the_same_instance() {
        let first: *const LookupTables = tables();
        let second: *const LookupTables = tables();
        assert!(std::ptr::eq(first, second));
    }
}
