use binrw::BinRead;
use log::debug;
use std::io::{Cursor, Seek, SeekFrom};
use std::path::Path;

pub mod class;
pub use class::*;
pub mod dump;

use crate::dex::*;
use crate::error::DexError;
use crate::Result;

/// A method prototype with its parameter list already resolved from the
/// side offset.
#[derive(Debug, Clone)]
pub struct Prototype {
    /// index into the string pool for the shorty descriptor
    pub shorty_idx: UInt,

    /// index into the type table for the return type
    pub return_type_idx: UInt,

    /// parameter types, as indices into the type table
    pub parameters: Vec<UShort>,
}

/// A parsed DEX image.
///
/// All tables are materialized by [Dex::parse] in dependency order (strings,
/// types, prototypes, fields, methods, classes) and never mutated afterwards.
/// Items reference each other through table indices only; anything that needs
/// to render an item takes the `Dex` as an explicit argument.
pub struct Dex {
    pub header: HeaderItem,
    pub strings: Vec<String>,
    pub types: Vec<TypeIdItem>,
    pub prototypes: Vec<Prototype>,
    pub fields: Vec<FieldIdItem>,
    pub methods: Vec<MethodIdItem>,
    pub classes: Vec<DexClass>,
}

macro_rules! check_index {
    ($idx:expr, $len:expr, $table:literal) => {
        if ($idx as usize) >= ($len as usize) {
            return Err(DexError::BadIndex {
                index: $idx as u32,
                table: $table,
                len: $len as usize,
            });
        }
    };
}
pub(crate) use check_index;

pub(crate) fn check_offset(
    len: usize,
    offset: u32,
    need: u64,
    section: &'static str,
) -> Result<()> {
    if (offset as usize) >= len || offset as u64 + need > len as u64 {
        return Err(DexError::BadOffset {
            offset,
            section,
            size: len,
        });
    }
    Ok(())
}

fn read_table<T>(
    cursor: &mut Cursor<&[u8]>,
    offset: u32,
    size: u32,
    stride: u64,
    section: &'static str,
) -> Result<Vec<T>>
where
    T: for<'a> BinRead<Args<'a> = ()> + binrw::meta::ReadEndian,
{
    if size == 0 {
        return Ok(Vec::new());
    }
    check_offset(cursor.get_ref().len(), offset, size as u64 * stride, section)?;
    cursor.seek(SeekFrom::Start(offset as u64))?;

    let mut items = Vec::with_capacity(size as usize);
    for _ in 0..size {
        items.push(T::read(cursor)?);
    }
    Ok(items)
}

impl Dex {
    /// Reads the file at `path` into memory and parses it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Dex> {
        let file = std::fs::File::open(path)?;
        // the mapping only has to live for the duration of the parse; the
        // resulting model owns all of its data
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        Dex::parse(&mmap)
    }

    /// Parses an in-memory DEX image.
    pub fn parse(data: &[u8]) -> Result<Dex> {
        if data.len() < 8 {
            return Err(DexError::ShortInput);
        }
        let mut magic = [0u8; 8];
        magic.copy_from_slice(&data[..8]);
        if magic != DEX_FILE_MAGIC {
            return Err(DexError::BadMagic(magic));
        }

        let mut cursor = Cursor::new(data);
        let header = HeaderItem::read(&mut cursor)?;
        header.validate()?;

        let mut dex = Dex {
            header,
            strings: Vec::new(),
            types: Vec::new(),
            prototypes: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            classes: Vec::new(),
        };

        dex.read_strings(&mut cursor)?;
        dex.read_types(&mut cursor)?;
        dex.read_prototypes(&mut cursor)?;
        dex.read_fields(&mut cursor)?;
        dex.read_methods(&mut cursor)?;
        dex.validate_indices()?;
        dex.read_classes(&mut cursor)?;

        Ok(dex)
    }

    fn read_strings(&mut self, cursor: &mut Cursor<&[u8]>) -> Result<()> {
        let ids: Vec<StringIdItem> = read_table(
            cursor,
            self.header.string_ids_off,
            self.header.string_ids_size,
            4,
            "string_ids",
        )?;

        self.strings.reserve(ids.len());
        for id in &ids {
            check_offset(cursor.get_ref().len(), id.string_data_off, 1, "string data")?;
            cursor.seek(SeekFrom::Start(id.string_data_off as u64))?;
            self.strings.push(mutf8::read(cursor)?);
        }
        debug!("loaded {} strings", self.strings.len());
        Ok(())
    }

    fn read_types(&mut self, cursor: &mut Cursor<&[u8]>) -> Result<()> {
        self.types = read_table(
            cursor,
            self.header.type_ids_off,
            self.header.type_ids_size,
            4,
            "type_ids",
        )?;
        debug!("loaded {} types", self.types.len());
        Ok(())
    }

    fn read_prototypes(&mut self, cursor: &mut Cursor<&[u8]>) -> Result<()> {
        let items: Vec<ProtoIdItem> = read_table(
            cursor,
            self.header.proto_ids_off,
            self.header.proto_ids_size,
            12,
            "proto_ids",
        )?;

        self.prototypes.reserve(items.len());
        for item in &items {
            let parameters = match item.parameters_off {
                0 => Vec::new(),
                off => read_type_list(cursor, off)?,
            };
            self.prototypes.push(Prototype {
                shorty_idx: item.shorty_idx,
                return_type_idx: item.return_type_idx,
                parameters,
            });
        }
        debug!("loaded {} prototypes", self.prototypes.len());
        Ok(())
    }

    fn read_fields(&mut self, cursor: &mut Cursor<&[u8]>) -> Result<()> {
        self.fields = read_table(
            cursor,
            self.header.field_ids_off,
            self.header.field_ids_size,
            8,
            "field_ids",
        )?;
        debug!("loaded {} field ids", self.fields.len());
        Ok(())
    }

    fn read_methods(&mut self, cursor: &mut Cursor<&[u8]>) -> Result<()> {
        self.methods = read_table(
            cursor,
            self.header.method_ids_off,
            self.header.method_ids_size,
            8,
            "method_ids",
        )?;
        debug!("loaded {} method ids", self.methods.len());
        Ok(())
    }

    fn read_classes(&mut self, cursor: &mut Cursor<&[u8]>) -> Result<()> {
        let defs: Vec<ClassDefItem> = read_table(
            cursor,
            self.header.class_defs_off,
            self.header.class_defs_size,
            32,
            "class_defs",
        )?;

        self.classes.reserve(defs.len());
        for def in defs {
            check_index!(def.class_idx, self.types.len(), "type_ids");
            if def.superclass_idx != NO_INDEX {
                check_index!(def.superclass_idx, self.types.len(), "type_ids");
            }
            if def.source_file_idx != NO_INDEX {
                check_index!(def.source_file_idx, self.strings.len(), "string_ids");
            }
            let class =
                DexClass::build(def, cursor, self.fields.len(), self.methods.len())?;
            self.classes.push(class);
        }
        debug!("loaded {} classes", self.classes.len());
        Ok(())
    }

    /// Checks every cross-table reference loaded so far. Any dangling index
    /// would otherwise only surface when the item is rendered.
    fn validate_indices(&self) -> Result<()> {
        for ty in &self.types {
            check_index!(ty.descriptor_idx, self.strings.len(), "string_ids");
        }
        for proto in &self.prototypes {
            check_index!(proto.shorty_idx, self.strings.len(), "string_ids");
            check_index!(proto.return_type_idx, self.types.len(), "type_ids");
            for &param in &proto.parameters {
                check_index!(param, self.types.len(), "type_ids");
            }
        }
        for field in &self.fields {
            check_index!(field.class_idx, self.types.len(), "type_ids");
            check_index!(field.type_idx, self.types.len(), "type_ids");
            check_index!(field.name_idx, self.strings.len(), "string_ids");
        }
        for method in &self.methods {
            check_index!(method.class_idx, self.types.len(), "type_ids");
            check_index!(method.proto_idx, self.prototypes.len(), "proto_ids");
            check_index!(method.name_idx, self.strings.len(), "string_ids");
        }
        Ok(())
    }

    // -- strings

    pub fn get_string(&self, idx: u32) -> Result<&str> {
        check_index!(idx, self.strings.len(), "string_ids");
        Ok(&self.strings[idx as usize])
    }

    // -- types

    pub fn get_type_desc(&self, type_idx: u32) -> Result<&str> {
        check_index!(type_idx, self.types.len(), "type_ids");
        self.get_string(self.types[type_idx as usize].descriptor_idx)
    }

    // -- prototypes

    pub fn get_proto(&self, proto_idx: u32) -> Result<&Prototype> {
        check_index!(proto_idx, self.prototypes.len(), "proto_ids");
        Ok(&self.prototypes[proto_idx as usize])
    }

    // -- fields

    pub fn get_field_id(&self, field_idx: u32) -> Result<&FieldIdItem> {
        check_index!(field_idx, self.fields.len(), "field_ids");
        Ok(&self.fields[field_idx as usize])
    }

    // -- methods

    pub fn get_method_id(&self, method_idx: u32) -> Result<&MethodIdItem> {
        check_index!(method_idx, self.methods.len(), "method_ids");
        Ok(&self.methods[method_idx as usize])
    }
}

/// Reads a type list (u32 count followed by u16 type indices) at `offset`.
pub(crate) fn read_type_list(cursor: &mut Cursor<&[u8]>, offset: u32) -> Result<Vec<UShort>> {
    check_offset(cursor.get_ref().len(), offset, 4, "type list")?;
    cursor.seek(SeekFrom::Start(offset as u64))?;
    let list = TypeList::read(cursor)?;
    Ok(list.list.iter().map(|item| item.type_idx).collect())
}
