//! 8-bit RGB <-> HSV conversion with hue in [0, 180).
//!
//! Forward conversion uses 12-bit fixed-point division tables and the inverse
//! runs in single precision, matching the byte-exact behaviour of the common
//! OpenCV `COLOR_RGB2HSV` / `COLOR_HSV2RGB` pair so edited output does not
//! drift from images produced by other tooling.

use std::sync::OnceLock;

/// Size of the hue circle in the halved representation.
pub const HUE_RANGE: f32 = 180.0;

const HSV_SHIFT: i32 = 12;
const ROUND_HALF: i32 = 1 << (HSV_SHIFT - 1);

struct DivTables {
    sdiv: [i32; 256],
    hdiv: [i32; 256],
}

static DIV_TABLES: OnceLock<DivTables> = OnceLock::new();

fn div_tables() -> &'static DivTables {
    DIV_TABLES.get_or_init(|| {
        let mut sdiv = [0i32; 256];
        let mut hdiv = [0i32; 256];
        for i in 1..256 {
            sdiv[i] = ((255 << HSV_SHIFT) as f64 / i as f64).round_ties_even() as i32;
            hdiv[i] = ((180 << HSV_SHIFT) as f64 / (6.0 * i as f64)).round_ties_even() as i32;
        }
        DivTables { sdiv, hdiv }
    })
}

/// Convert one RGB pixel to `[h, s, v]` with `h` in [0, 180).
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let tables = div_tables();
    let (r, g, b) = (r as i32, g as i32, b as i32);

    let v = r.max(g).max(b);
    let vmin = r.min(g).min(b);
    let diff = v - vmin;

    let s = (diff * tables.sdiv[v as usize] + ROUND_HALF) >> HSV_SHIFT;

    let h = if v == r {
        g - b
    } else if v == g {
        b - r + 2 * diff
    } else {
        r - g + 4 * diff
    };
    let mut h = (h * tables.hdiv[diff as usize] + ROUND_HALF) >> HSV_SHIFT;
    if h < 0 {
        h += HUE_RANGE as i32;
    }

    [h as u8, s as u8, v as u8]
}

/// Convert one `[h, s, v]` pixel (hue in [0, 180)) back to RGB.
pub fn hsv_to_rgb([h, s, v]: [u8; 3]) -> [u8; 3] {
    const SECTOR_DATA: [[usize; 3]; 6] = [
        [1, 3, 0],
        [1, 0, 2],
        [3, 0, 1],
        [0, 2, 1],
        [0, 1, 3],
        [2, 1, 0],
    ];

    let s = s as f32 * (1.0 / 255.0);
    let v = v as f32 * (1.0 / 255.0);

    let (r, g, b) = if s == 0.0 {
        (v, v, v)
    } else {
        let mut h = h as f32 * (6.0 / HUE_RANGE);
        while h >= 6.0 {
            h -= 6.0;
        }
        let mut sector = h.floor() as usize;
        h -= sector as f32;
        if sector >= 6 {
            sector = 0;
            h = 0.0;
        }

        let tab = [v, v * (1.0 - s), v * (1.0 - s * h), v * (1.0 - s * (1.0 - h))];
        let [bi, gi, ri] = SECTOR_DATA[sector];
        (tab[ri], tab[gi], tab[bi])
    };

    [to_u8(r), to_u8(g), to_u8(b)]
}

fn to_u8(unit: f32) -> u8 {
    (unit * 255.0).round_ties_even().clamp(0.0, 255.0) as u8
}
