use binrw::BinRead;

use super::encoded_value::{EncodedField, EncodedMethod};
use super::types::*;

/// A string identifier item stores the offset from the start of the file
/// to the string data.
#[derive(BinRead, Debug, Clone, Copy)]
#[br(little)]
pub struct StringIdItem {
    /// offset from the start of the file to the string data of this item.
    pub string_data_off: UInt,
}

#[derive(BinRead, Debug, Clone, Copy)]
#[br(little)]
pub struct TypeIdItem {
    /// index into the `string_ids` list for the descriptor string of this type.
    pub descriptor_idx: UInt,
}

#[derive(BinRead, Debug, Clone, Copy)]
#[br(little)]
pub struct ProtoIdItem {
    /// index into the `string_ids` list for the shorty string of this prototype.
    pub shorty_idx: UInt,

    /// index into the `type_ids` list for the return type of this prototype.
    pub return_type_idx: UInt,

    /// offset from the start of the file to the parameters of this
    /// prototype, or `0` if it has none.
    pub parameters_off: UInt,
}

#[derive(BinRead, Debug, Clone, Copy)]
#[br(little)]
pub struct FieldIdItem {
    /// index into the `type_ids` list for the enclosing type of this field.
    pub class_idx: UShort,

    /// index into the `type_ids` list for the type of this field.
    pub type_idx: UShort,

    /// index into the `string_ids` list for the name of this field.
    pub name_idx: UInt,
}

#[derive(BinRead, Debug, Clone, Copy)]
#[br(little)]
pub struct MethodIdItem {
    /// index into the `type_ids` list for the declaring class of this method.
    pub class_idx: UShort,

    /// index into the `proto_ids` list for the prototype of this method.
    pub proto_idx: UShort,

    /// index into the `string_ids` list for the name of this method.
    pub name_idx: UInt,
}

#[derive(BinRead, Debug, Clone, Copy)]
#[br(little)]
pub struct ClassDefItem {
    /// index into the `type_ids` list for this class.
    pub class_idx: UInt,

    /// access flags for this class.
    pub access_flags: UInt,

    /// index into the `type_ids` list for the superclass of this class. The
    /// value `NO_INDEX` indicates that this class has no superclass.
    pub superclass_idx: UInt,

    /// offset from the start of the file to the list of interfaces
    /// implemented by this class, or `0` if there are none.
    pub interfaces_off: UInt,

    /// index into the `string_ids` list for the source file from which this
    /// class was compiled. The value `NO_INDEX` indicates that there is no
    /// source file information present.
    pub source_file_idx: UInt,

    /// offset from the start of the file to the annotations directory of
    /// this class, or `0` if there are no annotations.
    pub annotations_off: UInt,

    /// offset from the start of the file to the class data for this class,
    /// or `0` if there is none.
    pub class_data_off: UInt,

    /// offset from the start of the file to the initial values for static
    /// fields, or `0` if there are none.
    pub static_values_off: UInt,
}

#[derive(BinRead, Debug, Clone, Copy)]
#[br(little)]
pub struct TypeItem {
    /// index into the `type_ids` list for the type of this item
    pub type_idx: UShort,
}

#[derive(BinRead, Debug, Clone)]
#[br(little)]
pub struct TypeList {
    /// the number of items in this list
    pub size: UInt,

    /// elements of this list
    #[br(count = size as usize)]
    pub list: Vec<TypeItem>,
}

/// The fixed header of a code item followed by the raw instruction stream.
///
/// Try blocks and handler lists that may trail the instructions are not
/// materialized by this reader.
#[derive(BinRead, Debug, Clone)]
#[br(little)]
pub struct CodeItem {
    /// the number of registers used by this code
    pub registers_size: UShort,

    /// the number of words of incoming arguments to the method that this
    /// code is for
    pub ins_size: UShort,

    /// the number of words of outgoing argument space
    pub outs_size: UShort,

    /// the number of try items for this instance
    pub tries_size: UShort,

    /// offset from the start of the file to the debug info (line numbers +
    /// local variable info) sequence for this code, or `0` if there simply
    /// is no information.
    pub debug_info_off: UInt,

    /// size of the instructions list, in 16-bit code units
    pub insns_size: UInt,

    /// actual bytecode, `insns_size` 16-bit code units stored little-endian.
    #[br(count = insns_size as usize * 2)]
    pub insns: Vec<UByte>,
}

/// A class data item: four uleb128 counts followed by the four lists.
///
/// Field and method entries carry differential indices; resolving them into
/// absolute `field_ids`/`method_ids` positions is the class loader's job.
#[derive(BinRead, Debug, Clone)]
#[br(little)]
pub struct ClassDataItem {
    /// the number of static fields in this item
    pub static_fields_size: ULeb128,

    /// the number of instance fields in this item
    pub instance_fields_size: ULeb128,

    /// the number of direct methods in this item
    pub direct_methods_size: ULeb128,

    /// the number of virtual methods in this item
    pub virtual_methods_size: ULeb128,

    /// the defined static fields, sorted by ascending field index and
    /// stored as index differences.
    #[br(count = static_fields_size.0 as usize)]
    pub static_fields: Vec<EncodedField>,

    /// the defined instance fields, encoded like `static_fields`.
    #[br(count = instance_fields_size.0 as usize)]
    pub instance_fields: Vec<EncodedField>,

    /// the defined direct (static, private, or constructor) methods,
    /// sorted by ascending method index and stored as index differences.
    #[br(count = direct_methods_size.0 as usize)]
    pub direct_methods: Vec<EncodedMethod>,

    /// the defined virtual methods, encoded like `direct_methods`.
    #[br(count = virtual_methods_size.0 as usize)]
    pub virtual_methods: Vec<EncodedMethod>,
}

// instruction payload data, referenced by 31t instructions and decoded at
// their branch targets

#[derive(BinRead, Debug, Clone)]
#[br(little)]
pub struct FillArrayData {
    /// number of bytes in each element
    pub element_width: UShort,

    /// number of elements in the table
    pub size: UInt,

    /// data values, `size * element_width` bytes
    #[br(count = (size as usize) * (element_width as usize))]
    pub data: Vec<UByte>,
}

#[derive(BinRead, Debug, Clone)]
#[br(little)]
pub struct PackedSwitch {
    /// number of entries in the table
    pub size: UShort,

    /// first (and lowest) switch case value
    pub first_key: Int,

    /// relative branch targets, in code units from the switch instruction
    #[br(count = size as usize)]
    pub targets: Vec<Int>,
}

#[derive(BinRead, Debug, Clone)]
#[br(little)]
pub struct SparseSwitch {
    /// number of entries in the table
    pub size: UShort,

    /// case values, sorted ascending
    #[br(count = size as usize)]
    pub keys: Vec<Int>,

    /// relative branch targets, one per key
    #[br(count = size as usize)]
    pub targets: Vec<Int>,
}
