//! Run time description of the layout of a point record.
//!
//! A [`RecordSchema`] is an ordered list of [`RecordItem`]s. The order
//! fixes both the layout of the uncompressed record and the order in
//! which the codecs run.
//!
//! ```
//! use lazperf::{DimensionKind, RecordSchema};
//!
//! # fn main() -> lazperf::Result<()> {
//! let mut schema = RecordSchema::new();
//! schema.add_point_core().add_gps_time().add_rgb();
//! schema.add_dimension("Amplitude", DimensionKind::Floating, 4)?;
//! assert_eq!(schema.total_size(), 20 + 8 + 6 + 4);
//! # Ok(())
//! # }
//! ```

use crate::LasZipError;

/// How the bytes of a dimension are to be interpreted
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DimensionKind {
    Signed,
    Unsigned,
    Floating,
}

impl DimensionKind {
    const SIGNED_CODE: u16 = 0x100;
    const UNSIGNED_CODE: u16 = 0x200;
    const FLOATING_CODE: u16 = 0x400;

    /// Code of the kind, or-ed with the size to form the laszip item type
    /// of a user dimension.
    pub(crate) fn type_code(self) -> u16 {
        match self {
            DimensionKind::Signed => Self::SIGNED_CODE,
            DimensionKind::Unsigned => Self::UNSIGNED_CODE,
            DimensionKind::Floating => Self::FLOATING_CODE,
        }
    }

    pub(crate) fn from_type_code(code: u16) -> Option<Self> {
        match code & 0xFF00 {
            Self::SIGNED_CODE => Some(DimensionKind::Signed),
            Self::UNSIGNED_CODE => Some(DimensionKind::Unsigned),
            Self::FLOATING_CODE => Some(DimensionKind::Floating),
            _ => None,
        }
    }

    fn supports_size(self, size: u8) -> bool {
        match self {
            DimensionKind::Signed | DimensionKind::Unsigned => [1, 2, 4, 8].contains(&size),
            DimensionKind::Floating => size == 4 || size == 8,
        }
    }
}

/// A named field of a point record
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Dimension {
    name: String,
    kind: DimensionKind,
    size: u8,
}

impl Dimension {
    /// Creates a dimension, failing if no codec exists for the kind and size.
    pub fn new<S: Into<String>>(name: S, kind: DimensionKind, size: u8) -> crate::Result<Self> {
        let name = name.into();
        if !kind.supports_size(size) {
            return Err(LasZipError::InvalidSchema(format!(
                "dimension '{}': {:?} values cannot be {} bytes wide",
                name, kind, size
            )));
        }
        Ok(Self { name, kind, size })
    }

    fn known(name: &str, kind: DimensionKind, size: u8) -> Self {
        debug_assert!(kind.supports_size(size));
        Self {
            name: name.to_owned(),
            kind,
            size,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DimensionKind {
        self.kind
    }

    pub fn size(&self) -> u8 {
        self.size
    }
}

/// One codec unit of a record.
///
/// The LAS groups map to the laszip items of the same name,
/// anything else is a single user [`Dimension`].
///
/// The items of the LAS 1.4 point formats (6 to 10) are coded in layers
/// and cannot be mixed with the other items in a schema.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RecordItem {
    /// The 20 bytes shared by the LAS point formats 0 to 5
    Point10,
    /// LAS gps time, a f64
    GpsTime,
    /// LAS red, green, blue as u16
    Rgb12,
    /// The 29 bytes wave packet of the LAS point formats 4 and 5
    WavePacket13,
    /// Opaque bytes
    ExtraBytes(u16),
    /// A single user dimension
    Dimension(Dimension),
    /// The 30 bytes shared by the LAS point formats 6 to 10
    Point14,
    /// LAS red, green, blue of the point format 7
    Rgb14,
    /// LAS red, green, blue and near infrared of the point formats 8 and 10
    RgbNir14,
    /// The wave packet of the LAS point formats 9 and 10
    WavePacket14,
    /// Opaque bytes after a [`RecordItem::Point14`]
    Byte14(u16),
}

impl RecordItem {
    pub const POINT10_SIZE: usize = 20;
    pub const GPS_TIME_SIZE: usize = 8;
    pub const RGB12_SIZE: usize = 6;
    pub const WAVE_PACKET_SIZE: usize = 29;
    pub const POINT14_SIZE: usize = 30;
    pub const RGBNIR14_SIZE: usize = 8;

    /// Number of bytes of the item in an uncompressed record
    pub fn size(&self) -> usize {
        match self {
            RecordItem::Point10 => Self::POINT10_SIZE,
            RecordItem::GpsTime => Self::GPS_TIME_SIZE,
            RecordItem::Rgb12 | RecordItem::Rgb14 => Self::RGB12_SIZE,
            RecordItem::WavePacket13 | RecordItem::WavePacket14 => Self::WAVE_PACKET_SIZE,
            RecordItem::ExtraBytes(count) | RecordItem::Byte14(count) => usize::from(*count),
            RecordItem::Dimension(dimension) => usize::from(dimension.size()),
            RecordItem::Point14 => Self::POINT14_SIZE,
            RecordItem::RgbNir14 => Self::RGBNIR14_SIZE,
        }
    }

    /// Returns true for the items coded in layers
    pub fn is_layered(&self) -> bool {
        match self {
            RecordItem::Point14
            | RecordItem::Rgb14
            | RecordItem::RgbNir14
            | RecordItem::WavePacket14
            | RecordItem::Byte14(_) => true,
            _ => false,
        }
    }

    /// The dimensions making up this item, in record order
    pub fn dimensions(&self) -> Vec<Dimension> {
        use DimensionKind::*;
        let rgb = || {
            vec![
                Dimension::known("Red", Unsigned, 2),
                Dimension::known("Green", Unsigned, 2),
                Dimension::known("Blue", Unsigned, 2),
            ]
        };
        let wave_packet = || {
            vec![
                Dimension::known("WavePacketDescriptorIndex", Unsigned, 1),
                Dimension::known("WaveformDataOffset", Unsigned, 8),
                Dimension::known("WaveformPacketSize", Unsigned, 4),
                Dimension::known("ReturnPointWaveformLocation", Floating, 4),
                Dimension::known("Dx", Floating, 4),
                Dimension::known("Dy", Floating, 4),
                Dimension::known("Dz", Floating, 4),
            ]
        };
        let extra_bytes = |count: u16| {
            (0..count)
                .map(|i| Dimension::known(&format!("ExtraByte{}", i), Unsigned, 1))
                .collect()
        };
        match self {
            RecordItem::Point10 => vec![
                Dimension::known("X", Signed, 4),
                Dimension::known("Y", Signed, 4),
                Dimension::known("Z", Signed, 4),
                Dimension::known("Intensity", Unsigned, 2),
                Dimension::known("ReturnBits", Unsigned, 1),
                Dimension::known("Classification", Unsigned, 1),
                Dimension::known("ScanAngleRank", Signed, 1),
                Dimension::known("UserData", Unsigned, 1),
                Dimension::known("PointSourceId", Unsigned, 2),
            ],
            RecordItem::GpsTime => vec![Dimension::known("GpsTime", Floating, 8)],
            RecordItem::Rgb12 | RecordItem::Rgb14 => rgb(),
            RecordItem::WavePacket13 | RecordItem::WavePacket14 => wave_packet(),
            RecordItem::ExtraBytes(count) | RecordItem::Byte14(count) => extra_bytes(*count),
            RecordItem::Dimension(dimension) => vec![dimension.clone()],
            RecordItem::Point14 => vec![
                Dimension::known("X", Signed, 4),
                Dimension::known("Y", Signed, 4),
                Dimension::known("Z", Signed, 4),
                Dimension::known("Intensity", Unsigned, 2),
                Dimension::known("ReturnBits", Unsigned, 1),
                Dimension::known("Flags", Unsigned, 1),
                Dimension::known("Classification", Unsigned, 1),
                Dimension::known("UserData", Unsigned, 1),
                Dimension::known("ScanAngle", Signed, 2),
                Dimension::known("PointSourceId", Unsigned, 2),
                Dimension::known("GpsTime", Floating, 8),
            ],
            RecordItem::RgbNir14 => {
                let mut dimensions = rgb();
                dimensions.push(Dimension::known("Infrared", Unsigned, 2));
                dimensions
            }
        }
    }
}

/// Ordered description of the fields of a point record
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct RecordSchema {
    items: Vec<RecordItem>,
}

impl RecordSchema {
    pub fn new() -> Self {
        Self { items: vec![] }
    }

    /// Returns the schema of a LAS point format (0 to 10) followed by
    /// `num_extra_bytes` extra bytes.
    pub fn for_point_format(point_format_id: u8, num_extra_bytes: u16) -> crate::Result<Self> {
        let mut schema = Self::new();
        match point_format_id {
            0 => schema.add_point_core(),
            1 => schema.add_point_core().add_gps_time(),
            2 => schema.add_point_core().add_rgb(),
            3 => schema.add_point_core().add_gps_time().add_rgb(),
            4 => schema.add_point_core().add_gps_time().add_wave_packet(),
            5 => schema
                .add_point_core()
                .add_gps_time()
                .add_rgb()
                .add_wave_packet(),
            6 => schema.add_point14(),
            7 => schema.add_point14().add_rgb14(),
            8 => schema.add_point14().add_rgbnir14(),
            9 => schema.add_point14().add_wave_packet14(),
            10 => schema.add_point14().add_rgbnir14().add_wave_packet14(),
            _ => {
                return Err(LasZipError::InvalidSchema(format!(
                    "point format {} is not supported",
                    point_format_id
                )))
            }
        };
        if point_format_id >= 6 {
            schema.add_byte14(num_extra_bytes);
        } else {
            schema.add_extra_bytes(num_extra_bytes);
        }
        Ok(schema)
    }

    /// Appends a user dimension
    pub fn add_dimension<S: Into<String>>(
        &mut self,
        name: S,
        kind: DimensionKind,
        size: u8,
    ) -> crate::Result<&mut Self> {
        let dimension = Dimension::new(name, kind, size)?;
        self.items.push(RecordItem::Dimension(dimension));
        Ok(self)
    }

    /// Appends the LAS point core fields (X, Y, Z ... PointSourceId)
    pub fn add_point_core(&mut self) -> &mut Self {
        self.items.push(RecordItem::Point10);
        self
    }

    /// Same as [`add_point_core`](#method.add_point_core)
    pub fn add_point(&mut self) -> &mut Self {
        self.add_point_core()
    }

    pub fn add_gps_time(&mut self) -> &mut Self {
        self.items.push(RecordItem::GpsTime);
        self
    }

    pub fn add_rgb(&mut self) -> &mut Self {
        self.items.push(RecordItem::Rgb12);
        self
    }

    /// Appends `count` opaque bytes, adding 0 bytes does nothing.
    pub fn add_extra_bytes(&mut self, count: u16) -> &mut Self {
        if count > 0 {
            self.items.push(RecordItem::ExtraBytes(count));
        }
        self
    }

    /// Appends the wave packet of the point formats 4 and 5
    pub fn add_wave_packet(&mut self) -> &mut Self {
        self.items.push(RecordItem::WavePacket13);
        self
    }

    /// Appends the core fields of the LAS 1.4 points (formats 6 to 10).
    ///
    /// It must be the first item of the schema.
    pub fn add_point14(&mut self) -> &mut Self {
        self.items.push(RecordItem::Point14);
        self
    }

    pub fn add_rgb14(&mut self) -> &mut Self {
        self.items.push(RecordItem::Rgb14);
        self
    }

    pub fn add_rgbnir14(&mut self) -> &mut Self {
        self.items.push(RecordItem::RgbNir14);
        self
    }

    pub fn add_wave_packet14(&mut self) -> &mut Self {
        self.items.push(RecordItem::WavePacket14);
        self
    }

    /// Appends `count` opaque bytes coded in layers, adding 0 bytes does nothing.
    pub fn add_byte14(&mut self, count: u16) -> &mut Self {
        if count > 0 {
            self.items.push(RecordItem::Byte14(count));
        }
        self
    }

    pub(crate) fn push_item(&mut self, item: RecordItem) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[RecordItem] {
        &self.items
    }

    /// Size in bytes of one record
    pub fn total_size(&self) -> usize {
        self.items.iter().map(RecordItem::size).sum()
    }

    /// All the dimensions, groups being expanded
    pub fn iter_dimensions(&self) -> impl Iterator<Item = Dimension> + '_ {
        self.items.iter().flat_map(RecordItem::dimensions)
    }

    pub fn is_empty(&self) -> bool {
        self.total_size() == 0
    }

    /// Returns true when the records are coded in layers,
    /// that is when the schema starts with [`RecordItem::Point14`].
    pub fn is_layered(&self) -> bool {
        self.items.first() == Some(&RecordItem::Point14)
    }

    /// Returns the LAS point format this schema corresponds to, if any.
    pub fn point_format_id(&self) -> Option<u8> {
        let (core, extra) = match self.items.split_last() {
            Some((extra @ RecordItem::ExtraBytes(_), core)) => (core, Some(extra)),
            Some((extra @ RecordItem::Byte14(_), core)) => (core, Some(extra)),
            _ => (&self.items[..], None),
        };
        use RecordItem::*;
        let id = match core {
            [Point10] => 0,
            [Point10, GpsTime] => 1,
            [Point10, Rgb12] => 2,
            [Point10, GpsTime, Rgb12] => 3,
            [Point10, GpsTime, WavePacket13] => 4,
            [Point10, GpsTime, Rgb12, WavePacket13] => 5,
            [Point14] => 6,
            [Point14, Rgb14] => 7,
            [Point14, RgbNir14] => 8,
            [Point14, WavePacket14] => 9,
            [Point14, RgbNir14, WavePacket14] => 10,
            _ => return None,
        };
        match extra {
            Some(item) if item.is_layered() != (id >= 6) => None,
            _ => Some(id),
        }
    }

    /// Checks that codecs can be built for this schema
    pub(crate) fn validate(&self) -> crate::Result<()> {
        if self.is_empty() {
            return Err(LasZipError::InvalidSchema(
                "the schema has no dimensions".to_owned(),
            ));
        }
        let num_layered = self.items.iter().filter(|item| item.is_layered()).count();
        if num_layered == 0 {
            return Ok(());
        }
        let num_point14 = self
            .items
            .iter()
            .filter(|item| **item == RecordItem::Point14)
            .count();
        if !self.is_layered() || num_point14 != 1 || num_layered != self.items.len() {
            return Err(LasZipError::InvalidSchema(
                "the items of the point formats 6 to 10 must start with a single point14 \
                 and cannot be mixed with other items"
                    .to_owned(),
            ));
        }
        Ok(())
    }

    /// Returns true if both schemas have the same dimension kinds and sizes
    /// in the same order, names are not compared.
    pub fn has_same_layout(&self, other: &RecordSchema) -> bool {
        self.iter_dimensions()
            .map(|d| (d.kind(), d.size()))
            .eq(other.iter_dimensions().map(|d| (d.kind(), d.size())))
    }
}
