use binrw::BinRead;
use std::io::{Cursor, Seek, SeekFrom};

use super::{check_index, check_offset, read_type_list};
use crate::dex::*;
use crate::error::DexError;
use crate::insns;
use crate::Result;

/// A field of a class with its absolute `field_ids` index resolved.
#[derive(Debug, Clone)]
pub struct ClassField {
    /// absolute index into the `field_ids` table
    pub field_idx: u32,

    /// access flags for this field
    pub access_flags: AccessFlags,
}

/// A method of a class with its absolute `method_ids` index resolved and,
/// if the method has a body, its code item loaded.
#[derive(Debug, Clone)]
pub struct ClassMethod {
    /// absolute index into the `method_ids` table
    pub method_idx: u32,

    /// access flags for this method
    pub access_flags: AccessFlags,

    /// offset from the start of the file to the code item, `0` for
    /// abstract and native methods
    pub code_off: u32,

    /// the method body, absent when `code_off` is `0`
    pub code: Option<CodeItem>,
}

impl ClassMethod {
    /// Disassembles the method body. Abstract and native methods yield an
    /// empty listing.
    pub fn disasm(&self) -> insns::Disassembly {
        match &self.code {
            Some(code) => insns::disasm(code),
            None => insns::Disassembly {
                insns: Vec::new(),
                error: None,
            },
        }
    }
}

/// A class definition together with its resolved class data.
#[derive(Debug, Clone)]
pub struct DexClass {
    /// the raw class-def record
    pub def: ClassDefItem,

    /// implemented interfaces, as indices into the type table
    pub interfaces: Vec<UShort>,

    pub static_fields: Vec<ClassField>,
    pub instance_fields: Vec<ClassField>,
    pub direct_methods: Vec<ClassMethod>,
    pub virtual_methods: Vec<ClassMethod>,

    /// initial values for the leading static fields, in field order
    pub static_values: Vec<EncodedValue>,
}

impl DexClass {
    pub(crate) fn build(
        def: ClassDefItem,
        cursor: &mut Cursor<&[u8]>,
        num_fields: usize,
        num_methods: usize,
    ) -> Result<DexClass> {
        let mut class = DexClass {
            def,
            interfaces: Vec::new(),
            static_fields: Vec::new(),
            instance_fields: Vec::new(),
            direct_methods: Vec::new(),
            virtual_methods: Vec::new(),
            static_values: Vec::new(),
        };

        if def.interfaces_off != 0 {
            class.interfaces = read_type_list(cursor, def.interfaces_off)?;
        }

        if def.class_data_off != 0 {
            check_offset(cursor.get_ref().len(), def.class_data_off, 4, "class data")?;
            cursor.seek(SeekFrom::Start(def.class_data_off as u64))?;
            let data = ClassDataItem::read(cursor)?;

            // each of the four lists starts over from index zero
            class.static_fields = resolve_fields(&data.static_fields, num_fields)?;
            class.instance_fields = resolve_fields(&data.instance_fields, num_fields)?;
            class.direct_methods = resolve_methods(&data.direct_methods, num_methods, cursor)?;
            class.virtual_methods = resolve_methods(&data.virtual_methods, num_methods, cursor)?;
        }

        if def.static_values_off != 0 {
            check_offset(
                cursor.get_ref().len(),
                def.static_values_off,
                1,
                "static values",
            )?;
            cursor.seek(SeekFrom::Start(def.static_values_off as u64))?;
            class.static_values = EncodedArray::read(cursor)?.values;
        }

        Ok(class)
    }

    /// All fields, statics first.
    pub fn fields(&self) -> impl Iterator<Item = &ClassField> {
        self.static_fields.iter().chain(self.instance_fields.iter())
    }

    /// All methods, direct ones first.
    pub fn methods(&self) -> impl Iterator<Item = &ClassMethod> {
        self.direct_methods.iter().chain(self.virtual_methods.iter())
    }
}

/// Undoes the differential encoding of a field list. The accumulator is
/// local: each list passed here resolves independently.
fn resolve_fields(list: &[EncodedField], num_fields: usize) -> Result<Vec<ClassField>> {
    let mut fields = Vec::with_capacity(list.len());
    let mut field_idx: u32 = 0;
    for encoded in list {
        field_idx = field_idx.wrapping_add(encoded.field_idx_diff.0);
        check_index!(field_idx, num_fields, "field_ids");
        fields.push(ClassField {
            field_idx,
            access_flags: AccessFlags::from_bits_truncate(encoded.access_flags.0),
        });
    }
    Ok(fields)
}

/// Undoes the differential encoding of a method list and loads each method's
/// code item, if any.
fn resolve_methods(
    list: &[EncodedMethod],
    num_methods: usize,
    cursor: &mut Cursor<&[u8]>,
) -> Result<Vec<ClassMethod>> {
    let mut methods = Vec::with_capacity(list.len());
    let mut method_idx: u32 = 0;
    for encoded in list {
        method_idx = method_idx.wrapping_add(encoded.method_idx_diff.0);
        check_index!(method_idx, num_methods, "method_ids");

        let code_off = encoded.code_off.0;
        let code = match code_off {
            0 => None,
            off => Some(read_code_item(cursor, off)?),
        };
        methods.push(ClassMethod {
            method_idx,
            access_flags: AccessFlags::from_bits_truncate(encoded.access_flags.0),
            code_off,
            code,
        });
    }
    Ok(methods)
}

/// Reads a code item at `offset`. Code items are 4-byte aligned.
fn read_code_item(cursor: &mut Cursor<&[u8]>, offset: u32) -> Result<CodeItem> {
    if offset % 4 != 0 {
        return Err(DexError::UnalignedOffset {
            offset,
            section: "code item",
        });
    }
    check_offset(cursor.get_ref().len(), offset, 16, "code item")?;
    cursor.seek(SeekFrom::Start(offset as u64))?;
    Ok(CodeItem::read(cursor)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dex::{EncodedField, EncodedMethod, ULeb128};

    fn field(diff: u32) -> EncodedField {
        EncodedField {
            field_idx_diff: ULeb128(diff),
            access_flags: ULeb128(0),
        }
    }

    fn method(diff: u32) -> EncodedMethod {
        EncodedMethod {
            method_idx_diff: ULeb128(diff),
            access_flags: ULeb128(0),
            code_off: ULeb128(0),
        }
    }

    #[test]
    fn test_field_diffs_accumulate() {
        let resolved = resolve_fields(&[field(3), field(1), field(5)], 16).unwrap();
        let indices: Vec<u32> = resolved.iter().map(|f| f.field_idx).collect();
        assert_eq!(indices, vec![3, 4, 9]);
    }

    #[test]
    fn test_method_diffs_accumulate() {
        let mut cursor = Cursor::new(&[][..]);
        let resolved =
            resolve_methods(&[method(2), method(0), method(1)], 4, &mut cursor).unwrap();
        let indices: Vec<u32> = resolved.iter().map(|m| m.method_idx).collect();
        assert_eq!(indices, vec![2, 2, 3]);
    }

    #[test]
    fn test_field_diff_out_of_range() {
        let err = resolve_fields(&[field(3)], 3).unwrap_err();
        assert!(matches!(err, DexError::BadIndex { table: "field_ids", .. }));
    }
}
