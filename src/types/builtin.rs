// Built-in data types
//
//  Copyright (C) 2014-2023 Ryan Specialty, LLC.
//
//  This file is part of TAME.
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Native storage of the built-in data types of the base namespace.
//!
//! The size and alignment of each built-in type is taken from a
//!   `#[repr(C)]` mirror of its in-memory representation,
//!     so that custom types laid out by [`super::TypeRegistry`] are
//!     compatible with native code compiled for the same target.
//!
//! Data types of the base namespace that are merely restrictions of a
//!   built-in type
//!     (e.g. `Duration` is a `Double`)
//!   resolve to that built-in type;
//!     see [`BuiltinType::from_id`].
//! So do its enumerations,
//!   which are stored as an `Int32`.
//! The structures of the base namespace that companion documents most
//!   often use as members
//!     (e.g. `Range` and `EUInformation`)
//!   have mirrors of their own.

use crate::id::NodeId;
use std::mem::{align_of, size_of};

/// `#[repr(C)]` mirrors of the native representation of built-in types.
///
/// These types are never instantiated;
///   they exist only to be measured.
#[allow(dead_code)]
mod native {
    #[repr(C)]
    pub struct String {
        pub length: usize,
        pub data: *mut u8,
    }

    #[repr(C)]
    pub struct Guid {
        pub data1: u32,
        pub data2: u16,
        pub data3: u16,
        pub data4: [u8; 8],
    }

    #[repr(C)]
    pub union Identifier {
        pub numeric: u32,
        pub string: std::mem::ManuallyDrop<String>,
        pub guid: std::mem::ManuallyDrop<Guid>,
    }

    #[repr(C)]
    pub struct NodeId {
        pub namespace_index: u16,
        pub identifier_type: u32,
        pub identifier: Identifier,
    }

    #[repr(C)]
    pub struct ExpandedNodeId {
        pub node_id: NodeId,
        pub namespace_uri: String,
        pub server_index: u32,
    }

    #[repr(C)]
    pub struct QualifiedName {
        pub namespace_index: u16,
        pub name: String,
    }

    #[repr(C)]
    pub struct LocalizedText {
        pub locale: String,
        pub text: String,
    }

    #[repr(C)]
    pub struct Encoded {
        pub type_id: std::mem::ManuallyDrop<NodeId>,
        pub body: std::mem::ManuallyDrop<String>,
    }

    #[repr(C)]
    pub struct Decoded {
        pub data_type: *const u8,
        pub data: *mut u8,
    }

    #[repr(C)]
    pub union Content {
        pub encoded: std::mem::ManuallyDrop<Encoded>,
        pub decoded: std::mem::ManuallyDrop<Decoded>,
    }

    #[repr(C)]
    pub struct ExtensionObject {
        pub encoding: u32,
        pub content: Content,
    }

    #[repr(C)]
    pub struct Variant {
        pub data_type: *const u8,
        pub storage_type: u32,
        pub array_length: usize,
        pub data: *mut u8,
        pub array_dimensions_size: usize,
        pub array_dimensions: *mut u32,
    }

    #[repr(C)]
    pub struct DataValue {
        pub value: Variant,
        pub source_timestamp: i64,
        pub server_timestamp: i64,
        pub source_picoseconds: u16,
        pub server_picoseconds: u16,
        pub status: u32,
        pub has_fields: u8,
    }

    #[repr(C)]
    pub struct DiagnosticInfo {
        pub has_fields: u8,
        pub symbolic_id: i32,
        pub namespace_uri: i32,
        pub localized_text: i32,
        pub locale: i32,
        pub additional_info: String,
        pub inner_status_code: u32,
        pub inner_diagnostic_info: *mut DiagnosticInfo,
    }

    #[repr(C)]
    pub struct Argument {
        pub name: String,
        pub data_type: NodeId,
        pub value_rank: i32,
        pub array_dimensions_size: usize,
        pub array_dimensions: *mut u32,
        pub description: LocalizedText,
    }

    #[repr(C)]
    pub struct BuildInfo {
        pub product_uri: String,
        pub manufacturer_name: String,
        pub product_name: String,
        pub software_version: String,
        pub build_number: String,
        pub build_date: i64,
    }

    #[repr(C)]
    pub struct Range {
        pub low: f64,
        pub high: f64,
    }

    #[repr(C)]
    pub struct EUInformation {
        pub namespace_uri: String,
        pub unit_id: i32,
        pub display_name: LocalizedText,
        pub description: LocalizedText,
    }

    #[repr(C)]
    pub struct EnumValueType {
        pub value: i64,
        pub display_name: LocalizedText,
        pub description: LocalizedText,
    }

    #[repr(C)]
    pub struct TimeZoneDataType {
        pub offset: i16,
        pub daylight_saving_in_offset: bool,
    }

    #[repr(C)]
    pub struct ComplexNumberType {
        pub real: f32,
        pub imaginary: f32,
    }

    #[repr(C)]
    pub struct DoubleComplexNumberType {
        pub real: f64,
        pub imaginary: f64,
    }

    #[repr(C)]
    pub struct AxisInformation {
        pub engineering_units: EUInformation,
        pub eu_range: Range,
        pub title: LocalizedText,
        pub axis_scale_type: i32,
        pub axis_steps_size: usize,
        pub axis_steps: *mut f64,
    }

    #[repr(C)]
    pub struct XVType {
        pub x: f64,
        pub value: f32,
    }

    #[repr(C)]
    pub struct KeyValuePair {
        pub key: QualifiedName,
        pub value: Variant,
    }
}

/// Enumerations of the base namespace.
const BASE_ENUMERATIONS: [&str; 23] = [
    "i=98",    // StructureType
    "i=120",   // NamingRuleType
    "i=257",   // NodeClass
    "i=302",   // MessageSecurityMode
    "i=303",   // UserTokenType
    "i=307",   // ApplicationType
    "i=315",   // SecurityTokenRequestType
    "i=510",   // BrowseDirection
    "i=517",   // BrowseResultMask
    "i=576",   // FilterOperator
    "i=625",   // TimestampsToReturn
    "i=716",   // MonitoringMode
    "i=717",   // DataChangeTrigger
    "i=718",   // DeadbandType
    "i=851",   // RedundancySupport
    "i=852",   // ServerState
    "i=890",   // ExceptionDeviationFormat
    "i=11234", // HistoryUpdateType
    "i=11293", // PerformUpdateType
    "i=11939", // OpenFileMode
    "i=12077", // AxisScaleEnumeration
    "i=12552", // TrustListMasks
    "i=14647", // PubSubState
];

// Array members are laid out as a length followed by a pointer;
//   both must share a size for the pair to be free of interior padding.
const_assert_eq!(size_of::<usize>(), size_of::<*const u8>());
const_assert_eq!(align_of::<usize>(), align_of::<*const u8>());

/// Built-in data types.
///
/// Discriminants are the numeric identifiers of the types in the base
///   namespace,
///     except for [`BuiltinType::Variant`] and
///     [`BuiltinType::ExtensionObject`],
///       which stand in for the abstract `BaseDataType` and `Structure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuiltinType {
    Boolean = 1,
    SByte = 2,
    Byte = 3,
    Int16 = 4,
    UInt16 = 5,
    Int32 = 6,
    UInt32 = 7,
    Int64 = 8,
    UInt64 = 9,
    Float = 10,
    Double = 11,
    String = 12,
    DateTime = 13,
    Guid = 14,
    ByteString = 15,
    XmlElement = 16,
    NodeId = 17,
    ExpandedNodeId = 18,
    StatusCode = 19,
    QualifiedName = 20,
    LocalizedText = 21,
    ExtensionObject = 22,
    DataValue = 23,
    Variant = 24,
    DiagnosticInfo = 25,

    // Structures
    Argument = 296,
    BuildInfo = 338,
    Range = 884,
    EUInformation = 887,
    EnumValueType = 7594,
    TimeZoneDataType = 8912,
    AxisInformation = 12079,
    XVType = 12080,
    ComplexNumberType = 12171,
    DoubleComplexNumberType = 12172,
    KeyValuePair = 14533,
}

impl BuiltinType {
    /// Identifier of the type in the base namespace.
    pub fn id(&self) -> NodeId<'static> {
        use BuiltinType::*;

        crate::id::NodeId::new(
            0,
            match self {
                Boolean => "i=1",
                SByte => "i=2",
                Byte => "i=3",
                Int16 => "i=4",
                UInt16 => "i=5",
                Int32 => "i=6",
                UInt32 => "i=7",
                Int64 => "i=8",
                UInt64 => "i=9",
                Float => "i=10",
                Double => "i=11",
                String => "i=12",
                DateTime => "i=13",
                Guid => "i=14",
                ByteString => "i=15",
                XmlElement => "i=16",
                NodeId => "i=17",
                ExpandedNodeId => "i=18",
                StatusCode => "i=19",
                QualifiedName => "i=20",
                LocalizedText => "i=21",
                ExtensionObject => "i=22",
                DataValue => "i=23",
                Variant => "i=24",
                DiagnosticInfo => "i=25",
                Argument => "i=296",
                BuildInfo => "i=338",
                Range => "i=884",
                EUInformation => "i=887",
                EnumValueType => "i=7594",
                TimeZoneDataType => "i=8912",
                AxisInformation => "i=12079",
                XVType => "i=12080",
                ComplexNumberType => "i=12171",
                DoubleComplexNumberType => "i=12172",
                KeyValuePair => "i=14533",
            },
        )
    }

    /// Resolve a base namespace data type to its native storage.
    ///
    /// Besides the built-in types themselves,
    ///   this resolves the well-known restrictions of built-in types,
    ///   the enumerations of the base namespace
    ///     (which are stored as an [`BuiltinType::Int32`]),
    ///   and the abstract numeric types
    ///     (which are stored as a [`BuiltinType::Variant`]).
    pub fn from_id(id: NodeId) -> Option<Self> {
        use BuiltinType::*;

        if !id.is_base() {
            return None;
        }

        let found = match id.id() {
            "i=1" => Boolean,
            "i=2" => SByte,
            "i=3" => Byte,
            "i=4" => Int16,
            "i=5" => UInt16,
            "i=6" => Int32,
            "i=7" => UInt32,
            "i=8" => Int64,
            "i=9" => UInt64,
            "i=10" => Float,
            "i=11" => Double,
            "i=12" => String,
            "i=13" => DateTime,
            "i=14" => Guid,
            "i=15" => ByteString,
            "i=16" => XmlElement,
            "i=17" => NodeId,
            "i=18" => ExpandedNodeId,
            "i=19" => StatusCode,
            "i=20" => QualifiedName,
            "i=21" => LocalizedText,
            "i=22" => ExtensionObject, // Structure
            "i=23" => DataValue,
            "i=24" => Variant, // BaseDataType
            "i=25" => DiagnosticInfo,

            // Number, Integer, UInteger
            "i=26" | "i=27" | "i=28" => Variant,

            // Enumeration
            "i=29" => Int32,

            // Image, ImageBMP, ImageGIF, ImageJPG, ImagePNG
            "i=30" | "i=2000" | "i=2001" | "i=2002" | "i=2003" => ByteString,

            "i=256" => UInt32,  // IdType
            "i=288" => UInt32,  // IntegerId
            "i=289" => UInt32,  // Counter
            "i=290" => Double,  // Duration
            "i=291" => String,  // NumericRange
            "i=294" => DateTime, // UtcTime
            "i=295" => String,  // LocaleId
            "i=17588" => UInt32, // Index

            "i=296" => Argument,
            "i=338" => BuildInfo,
            "i=884" => Range,
            "i=887" => EUInformation,
            "i=7594" => EnumValueType,
            "i=8912" => TimeZoneDataType,
            "i=12079" => AxisInformation,
            "i=12080" => XVType,
            "i=12171" => ComplexNumberType,
            "i=12172" => DoubleComplexNumberType,
            "i=14533" => KeyValuePair,

            other if BASE_ENUMERATIONS.contains(&other) => Int32,

            _ => return None,
        };

        Some(found)
    }

    pub fn name(&self) -> &'static str {
        use BuiltinType::*;

        match self {
            Boolean => "Boolean",
            SByte => "SByte",
            Byte => "Byte",
            Int16 => "Int16",
            UInt16 => "UInt16",
            Int32 => "Int32",
            UInt32 => "UInt32",
            Int64 => "Int64",
            UInt64 => "UInt64",
            Float => "Float",
            Double => "Double",
            String => "String",
            DateTime => "DateTime",
            Guid => "Guid",
            ByteString => "ByteString",
            XmlElement => "XmlElement",
            NodeId => "NodeId",
            ExpandedNodeId => "ExpandedNodeId",
            StatusCode => "StatusCode",
            QualifiedName => "QualifiedName",
            LocalizedText => "LocalizedText",
            ExtensionObject => "ExtensionObject",
            DataValue => "DataValue",
            Variant => "Variant",
            DiagnosticInfo => "DiagnosticInfo",
            Argument => "Argument",
            BuildInfo => "BuildInfo",
            Range => "Range",
            EUInformation => "EUInformation",
            EnumValueType => "EnumValueType",
            TimeZoneDataType => "TimeZoneDataType",
            AxisInformation => "AxisInformation",
            XVType => "XVType",
            ComplexNumberType => "ComplexNumberType",
            DoubleComplexNumberType => "DoubleComplexNumberType",
            KeyValuePair => "KeyValuePair",
        }
    }

    /// Native size in bytes.
    pub fn size(&self) -> usize {
        use BuiltinType::*;

        match self {
            Boolean => size_of::<bool>(),
            SByte => size_of::<i8>(),
            Byte => size_of::<u8>(),
            Int16 => size_of::<i16>(),
            UInt16 => size_of::<u16>(),
            Int32 => size_of::<i32>(),
            UInt32 | StatusCode => size_of::<u32>(),
            Int64 | DateTime => size_of::<i64>(),
            UInt64 => size_of::<u64>(),
            Float => size_of::<f32>(),
            Double => size_of::<f64>(),
            String | ByteString | XmlElement => size_of::<native::String>(),
            Guid => size_of::<native::Guid>(),
            NodeId => size_of::<native::NodeId>(),
            ExpandedNodeId => size_of::<native::ExpandedNodeId>(),
            QualifiedName => size_of::<native::QualifiedName>(),
            LocalizedText => size_of::<native::LocalizedText>(),
            ExtensionObject => size_of::<native::ExtensionObject>(),
            DataValue => size_of::<native::DataValue>(),
            Variant => size_of::<native::Variant>(),
            DiagnosticInfo => size_of::<native::DiagnosticInfo>(),
            Argument => size_of::<native::Argument>(),
            BuildInfo => size_of::<native::BuildInfo>(),
            Range => size_of::<native::Range>(),
            EUInformation => size_of::<native::EUInformation>(),
            EnumValueType => size_of::<native::EnumValueType>(),
            TimeZoneDataType => size_of::<native::TimeZoneDataType>(),
            AxisInformation => size_of::<native::AxisInformation>(),
            XVType => size_of::<native::XVType>(),
            ComplexNumberType => size_of::<native::ComplexNumberType>(),
            DoubleComplexNumberType => size_of::<native::DoubleComplexNumberType>(),
            KeyValuePair => size_of::<native::KeyValuePair>(),
        }
    }

    /// Native alignment in bytes.
    pub fn align(&self) -> usize {
        use BuiltinType::*;

        match self {
            Boolean => align_of::<bool>(),
            SByte => align_of::<i8>(),
            Byte => align_of::<u8>(),
            Int16 => align_of::<i16>(),
            UInt16 => align_of::<u16>(),
            Int32 => align_of::<i32>(),
            UInt32 | StatusCode => align_of::<u32>(),
            Int64 | DateTime => align_of::<i64>(),
            UInt64 => align_of::<u64>(),
            Float => align_of::<f32>(),
            Double => align_of::<f64>(),
            String | ByteString | XmlElement => align_of::<native::String>(),
            Guid => align_of::<native::Guid>(),
            NodeId => align_of::<native::NodeId>(),
            ExpandedNodeId => align_of::<native::ExpandedNodeId>(),
            QualifiedName => align_of::<native::QualifiedName>(),
            LocalizedText => align_of::<native::LocalizedText>(),
            ExtensionObject => align_of::<native::ExtensionObject>(),
            DataValue => align_of::<native::DataValue>(),
            Variant => align_of::<native::Variant>(),
            DiagnosticInfo => align_of::<native::DiagnosticInfo>(),
            Argument => align_of::<native::Argument>(),
            BuildInfo => align_of::<native::BuildInfo>(),
            Range => align_of::<native::Range>(),
            EUInformation => align_of::<native::EUInformation>(),
            EnumValueType => align_of::<native::EnumValueType>(),
            TimeZoneDataType => align_of::<native::TimeZoneDataType>(),
            AxisInformation => align_of::<native::AxisInformation>(),
            XVType => align_of::<native::XVType>(),
            ComplexNumberType => align_of::<native::ComplexNumberType>(),
            DoubleComplexNumberType => align_of::<native::DoubleComplexNumberType>(),
            KeyValuePair => align_of::<native::KeyValuePair>(),
        }
    }

    /// Whether the native representation contains no pointers.
    pub fn is_pointer_free(&self) -> bool {
        use BuiltinType::*;

        matches!(
            self,
            Boolean
                | SByte
                | Byte
                | Int16
                | UInt16
                | Int32
                | UInt32
                | Int64
                | UInt64
                | Float
                | Double
                | DateTime
                | Guid
                | StatusCode
                | Range
                | TimeZoneDataType
                | XVType
                | ComplexNumberType
                | DoubleComplexNumberType
        )
    }

    /// Whether the native representation is identical to the binary
    ///   encoding,
    ///     allowing values to be copied without conversion.
    ///
    /// The binary encoding is little-endian;
    ///   nothing is overlayable on a big-endian target.
    pub fn is_overlayable(&self) -> bool {
        use BuiltinType::*;

        // Tail padding has no counterpart in the encoding.
        let padded = matches!(self, TimeZoneDataType | XVType);

        cfg!(target_endian = "little") && self.is_pointer_free() && !padded
    }
}

impl std::fmt::Display for BuiltinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builtins_resolve_to_themselves() {
        for ty in [
            BuiltinType::Boolean,
            BuiltinType::Int32,
            BuiltinType::String,
            BuiltinType::LocalizedText,
            BuiltinType::DiagnosticInfo,
        ] {
            assert_eq!(Some(ty), BuiltinType::from_id(ty.id()));
        }
    }

    #[test]
    fn restrictions_resolve_to_storage() {
        let resolve = |id| BuiltinType::from_id(NodeId::new(0, id));

        assert_eq!(Some(BuiltinType::Double), resolve("i=290"));
        assert_eq!(Some(BuiltinType::DateTime), resolve("i=294"));
        assert_eq!(Some(BuiltinType::String), resolve("i=295"));
        assert_eq!(Some(BuiltinType::ByteString), resolve("i=2003"));
        assert_eq!(Some(BuiltinType::Variant), resolve("i=26"));
        assert_eq!(Some(BuiltinType::Int32), resolve("i=29"));
    }

    #[test]
    fn base_enumerations_are_int32() {
        let resolve = |id| BuiltinType::from_id(NodeId::new(0, id));

        assert_eq!(Some(BuiltinType::Int32), resolve("i=852"));
        assert_eq!(Some(BuiltinType::Int32), resolve("i=302"));
    }

    #[test]
    fn base_structures_have_native_layout() {
        let range = BuiltinType::from_id(NodeId::new(0, "i=884"));

        assert_eq!(Some(BuiltinType::Range), range);
        assert_eq!(16, BuiltinType::Range.size());
        assert_eq!(align_of::<f64>(), BuiltinType::Range.align());
        assert!(BuiltinType::Range.is_pointer_free());

        assert_eq!(
            size_of::<usize>() + 2 * BuiltinType::LocalizedText.size()
                + BuiltinType::String.size(),
            BuiltinType::EUInformation.size()
        );
        assert!(!BuiltinType::EUInformation.is_pointer_free());
        assert!(!BuiltinType::XVType.is_overlayable());
    }

    #[test]
    fn non_base_namespace_is_never_builtin() {
        assert_eq!(None, BuiltinType::from_id(NodeId::new(1, "i=6")));
        assert_eq!(None, BuiltinType::from_id(NodeId::new(0, "i=58")));
    }

    #[test]
    fn primitive_sizes_match_native() {
        assert_eq!(1, BuiltinType::Boolean.size());
        assert_eq!(4, BuiltinType::Int32.size());
        assert_eq!(4, BuiltinType::Int32.align());
        assert_eq!(8, BuiltinType::Double.size());
        assert_eq!(16, BuiltinType::Guid.size());
        assert_eq!(4, BuiltinType::Guid.align());
        assert_eq!(2 * size_of::<usize>(), BuiltinType::String.size());
    }

    #[test]
    fn strings_are_not_pointer_free() {
        assert!(!BuiltinType::String.is_pointer_free());
        assert!(!BuiltinType::Variant.is_pointer_free());
        assert!(BuiltinType::Guid.is_pointer_free());
    }
}
