#![allow(dead_code)]

use lazperf::{DimensionKind, RecordItem, RecordSchema};

/// Small deterministic generator, so tests do not need data files
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Lcg(seed.wrapping_mul(6364136223846793005).wrapping_add(1))
    }

    pub fn next_u32(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    pub fn below(&mut self, n: u32) -> u32 {
        self.next_u32() % n
    }
}

/// Generates `count` records that look like survey data:
/// coordinates and times that drift, attributes that mostly repeat.
pub fn make_points(schema: &RecordSchema, count: usize, seed: u64) -> Vec<u8> {
    let mut rng = Lcg::new(seed);
    let mut points = Vec::with_capacity(count * schema.total_size());
    let (mut x, mut y, mut z) = (1_000_000i32, -2_000_000i32, 3_000i32);
    let mut gps_time = 400_000.0f64;
    let mut rgb = [12_000u16, 30_000, 50_000];
    let mut floating = 1.5f64;
    let mut nir = 20_000u16;
    let mut channel = 0u8;
    let mut wave_offset = 4096u64;

    for _ in 0..count {
        x = x.wrapping_add(rng.below(200) as i32 - 100);
        y = y.wrapping_add(rng.below(50) as i32);
        z = z.wrapping_add(rng.below(21) as i32 - 10);
        gps_time += f64::from(rng.below(1000)) * 1e-5;
        floating += f64::from(rng.below(100)) * 0.25 - 12.0;
        if rng.below(16) == 0 {
            channel = rng.below(4) as u8;
        }

        for item in schema.items() {
            match item {
                RecordItem::Point10 => {
                    points.extend_from_slice(&x.to_le_bytes());
                    points.extend_from_slice(&y.to_le_bytes());
                    points.extend_from_slice(&z.to_le_bytes());
                    points.extend_from_slice(&(rng.below(4096) as u16).to_le_bytes());
                    let number_of_returns = 1 + rng.below(3) as u8;
                    let return_number = 1 + rng.below(u32::from(number_of_returns)) as u8;
                    let scan_direction = (rng.below(8) == 0) as u8;
                    points.push(return_number | number_of_returns << 3 | scan_direction << 6);
                    points.push([2u8, 2, 2, 5, 6][rng.below(5) as usize]);
                    points.push((rng.below(31) as i8 - 15) as u8);
                    points.push(0);
                    points.extend_from_slice(&(17u16 + (rng.below(16) == 0) as u16).to_le_bytes());
                }
                RecordItem::Point14 => {
                    points.extend_from_slice(&x.to_le_bytes());
                    points.extend_from_slice(&y.to_le_bytes());
                    points.extend_from_slice(&z.to_le_bytes());
                    points.extend_from_slice(&(rng.below(4096) as u16).to_le_bytes());
                    let number_of_returns = 1 + rng.below(5) as u8;
                    let return_number = 1 + rng.below(u32::from(number_of_returns)) as u8;
                    points.push(return_number | number_of_returns << 4);
                    let scan_direction = (rng.below(8) == 0) as u8;
                    points.push(channel << 4 | scan_direction << 6);
                    points.push([2u8, 2, 2, 5, 6, 40][rng.below(6) as usize]);
                    points.push(channel);
                    points.extend_from_slice(&(rng.below(2001) as i16 - 1000).to_le_bytes());
                    points.extend_from_slice(&(17u16 + (rng.below(16) == 0) as u16).to_le_bytes());
                    points.extend_from_slice(&gps_time.to_le_bytes());
                }
                RecordItem::GpsTime => points.extend_from_slice(&gps_time.to_le_bytes()),
                RecordItem::Rgb14 | RecordItem::RgbNir14 => {
                    for channel in rgb.iter_mut() {
                        *channel = channel.wrapping_add(rng.below(512) as u16).wrapping_sub(256);
                        points.extend_from_slice(&channel.to_le_bytes());
                    }
                    if *item == RecordItem::RgbNir14 {
                        nir = nir.wrapping_add(rng.below(64) as u16).wrapping_sub(32);
                        points.extend_from_slice(&nir.to_le_bytes());
                    }
                }
                RecordItem::WavePacket13 | RecordItem::WavePacket14 => {
                    let size = 128 + rng.below(2) * 128;
                    wave_offset += u64::from(size);
                    points.push(1 + rng.below(2) as u8);
                    points.extend_from_slice(&wave_offset.to_le_bytes());
                    points.extend_from_slice(&size.to_le_bytes());
                    points.extend_from_slice(&(rng.below(1000) as f32 * 0.5).to_le_bytes());
                    points.extend_from_slice(&(-1.0e-4f32).to_le_bytes());
                    points.extend_from_slice(&(2.5e-5f32).to_le_bytes());
                    points.extend_from_slice(&(-0.15f32).to_le_bytes());
                }
                RecordItem::Rgb12 => {
                    for channel in rgb.iter_mut() {
                        *channel = channel.wrapping_add(rng.below(512) as u16).wrapping_sub(256);
                        points.extend_from_slice(&channel.to_le_bytes());
                    }
                }
                RecordItem::ExtraBytes(n) | RecordItem::Byte14(n) => {
                    for i in 0..*n {
                        points.push(if i % 2 == 0 { rng.below(4) as u8 } else { 0x55 });
                    }
                }
                RecordItem::Dimension(dimension) => {
                    let size = usize::from(dimension.size());
                    match (dimension.kind(), size) {
                        (DimensionKind::Floating, 8) => {
                            points.extend_from_slice(&floating.to_le_bytes())
                        }
                        (DimensionKind::Floating, _) => {
                            points.extend_from_slice(&(floating as f32).to_le_bytes())
                        }
                        (DimensionKind::Signed, _) => {
                            let v = i64::from(z) * 1_000 - i64::from(rng.below(7));
                            points.extend_from_slice(&v.to_le_bytes()[..size]);
                        }
                        (DimensionKind::Unsigned, _) => {
                            let v = u64::from(rng.next_u32()) << 16 | u64::from(rng.below(3));
                            points.extend_from_slice(&v.to_le_bytes()[..size]);
                        }
                    }
                }
            }
        }
    }
    points
}

pub fn point_format_schema(point_format_id: u8, num_extra_bytes: u16) -> RecordSchema {
    RecordSchema::for_point_format(point_format_id, num_extra_bytes).unwrap()
}
