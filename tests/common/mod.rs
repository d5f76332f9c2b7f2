//! A small builder for synthetic DEX images, enough to exercise the parser
//! without shipping binary fixtures.

use dexread::dex::{HEADER_SIZE, NO_INDEX};

pub const ACC_PUBLIC: u32 = 0x0001;
pub const ACC_STATIC: u32 = 0x0008;
pub const ACC_CONSTRUCTOR: u32 = 0x10000;

#[derive(Default, Clone)]
pub struct MethodSpec {
    /// differential method index, exactly as stored on disk
    pub idx_diff: u32,
    pub access_flags: u32,
    pub registers: u16,
    /// instruction stream in code units; `None` means no body
    pub code: Option<Vec<u16>>,
}

impl MethodSpec {
    pub fn new(idx_diff: u32, access_flags: u32, code: Option<Vec<u16>>) -> Self {
        MethodSpec {
            idx_diff,
            access_flags,
            registers: 1,
            code,
        }
    }
}

#[derive(Clone)]
pub struct ClassSpec {
    pub class_idx: u32,
    pub access_flags: u32,
    pub superclass_idx: u32,
    pub source_file_idx: u32,
    pub interfaces: Vec<u16>,
    /// (field_idx_diff, access_flags) pairs, exactly as stored on disk
    pub static_fields: Vec<(u32, u32)>,
    pub instance_fields: Vec<(u32, u32)>,
    pub direct_methods: Vec<MethodSpec>,
    pub virtual_methods: Vec<MethodSpec>,
    /// raw encoded-array bytes (uleb count followed by encoded values)
    pub static_values: Option<Vec<u8>>,
}

impl ClassSpec {
    pub fn new(class_idx: u32, superclass_idx: u32) -> Self {
        ClassSpec {
            class_idx,
            access_flags: ACC_PUBLIC,
            superclass_idx,
            source_file_idx: NO_INDEX,
            interfaces: Vec::new(),
            static_fields: Vec::new(),
            instance_fields: Vec::new(),
            direct_methods: Vec::new(),
            virtual_methods: Vec::new(),
            static_values: None,
        }
    }

    fn has_class_data(&self) -> bool {
        !self.static_fields.is_empty()
            || !self.instance_fields.is_empty()
            || !self.direct_methods.is_empty()
            || !self.virtual_methods.is_empty()
    }
}

#[derive(Default)]
pub struct DexBuilder {
    pub strings: Vec<String>,
    /// descriptor string index per type
    pub types: Vec<u32>,
    /// (shorty_idx, return_type_idx, parameter type indices)
    pub protos: Vec<(u32, u32, Vec<u16>)>,
    /// (class type idx, type idx, name string idx)
    pub fields: Vec<(u16, u16, u32)>,
    /// (class type idx, proto idx, name string idx)
    pub methods: Vec<(u16, u16, u32)>,
    pub classes: Vec<ClassSpec>,
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_uleb(out: &mut Vec<u8>, value: u32) {
    leb128::write::unsigned(out, value as u64).unwrap();
}

fn align4(data: &mut Vec<u8>, base: usize) {
    while (base + data.len()) % 4 != 0 {
        data.push(0);
    }
}

impl DexBuilder {
    pub fn new() -> Self {
        DexBuilder::default()
    }

    pub fn build(&self) -> Vec<u8> {
        let string_ids_off = HEADER_SIZE;
        let type_ids_off = string_ids_off + 4 * self.strings.len();
        let proto_ids_off = type_ids_off + 4 * self.types.len();
        let field_ids_off = proto_ids_off + 12 * self.protos.len();
        let method_ids_off = field_ids_off + 8 * self.fields.len();
        let class_defs_off = method_ids_off + 8 * self.methods.len();
        let data_off = class_defs_off + 32 * self.classes.len();

        // data section, with every recorded offset already absolute
        let mut data: Vec<u8> = Vec::new();

        let string_offs: Vec<u32> = self
            .strings
            .iter()
            .map(|s| {
                let off = (data_off + data.len()) as u32;
                push_uleb(&mut data, s.encode_utf16().count() as u32);
                data.extend_from_slice(s.as_bytes());
                data.push(0);
                off
            })
            .collect();

        let proto_param_offs: Vec<u32> = self
            .protos
            .iter()
            .map(|(_, _, params)| {
                if params.is_empty() {
                    return 0;
                }
                align4(&mut data, data_off);
                let off = (data_off + data.len()) as u32;
                push_u32(&mut data, params.len() as u32);
                for &param in params {
                    push_u16(&mut data, param);
                }
                off
            })
            .collect();

        struct ClassOffsets {
            interfaces_off: u32,
            class_data_off: u32,
            static_values_off: u32,
        }

        let class_offs: Vec<ClassOffsets> = self
            .classes
            .iter()
            .map(|class| {
                let interfaces_off = if class.interfaces.is_empty() {
                    0
                } else {
                    align4(&mut data, data_off);
                    let off = (data_off + data.len()) as u32;
                    push_u32(&mut data, class.interfaces.len() as u32);
                    for &iface in &class.interfaces {
                        push_u16(&mut data, iface);
                    }
                    off
                };

                // code items first so the class data can reference them
                let mut code_offs: Vec<u32> = Vec::new();
                for method in class.direct_methods.iter().chain(&class.virtual_methods) {
                    match &method.code {
                        None => code_offs.push(0),
                        Some(units) => {
                            align4(&mut data, data_off);
                            code_offs.push((data_off + data.len()) as u32);
                            push_u16(&mut data, method.registers);
                            push_u16(&mut data, 0); // ins_size
                            push_u16(&mut data, 0); // outs_size
                            push_u16(&mut data, 0); // tries_size
                            push_u32(&mut data, 0); // debug_info_off
                            push_u32(&mut data, units.len() as u32);
                            for &unit in units {
                                push_u16(&mut data, unit);
                            }
                        }
                    }
                }

                let class_data_off = if !class.has_class_data() {
                    0
                } else {
                    let off = (data_off + data.len()) as u32;
                    push_uleb(&mut data, class.static_fields.len() as u32);
                    push_uleb(&mut data, class.instance_fields.len() as u32);
                    push_uleb(&mut data, class.direct_methods.len() as u32);
                    push_uleb(&mut data, class.virtual_methods.len() as u32);
                    for &(diff, flags) in &class.static_fields {
                        push_uleb(&mut data, diff);
                        push_uleb(&mut data, flags);
                    }
                    for &(diff, flags) in &class.instance_fields {
                        push_uleb(&mut data, diff);
                        push_uleb(&mut data, flags);
                    }
                    for (i, method) in class
                        .direct_methods
                        .iter()
                        .chain(&class.virtual_methods)
                        .enumerate()
                    {
                        push_uleb(&mut data, method.idx_diff);
                        push_uleb(&mut data, method.access_flags);
                        push_uleb(&mut data, code_offs[i]);
                    }
                    off
                };

                let static_values_off = match &class.static_values {
                    None => 0,
                    Some(bytes) => {
                        let off = (data_off + data.len()) as u32;
                        data.extend_from_slice(bytes);
                        off
                    }
                };

                ClassOffsets {
                    interfaces_off,
                    class_data_off,
                    static_values_off,
                }
            })
            .collect();

        // assemble the image
        let file_size = data_off + data.len();
        let mut out: Vec<u8> = Vec::with_capacity(file_size);

        out.extend_from_slice(b"dex\n035\0");
        push_u32(&mut out, 0); // checksum, not verified
        out.extend_from_slice(&[0u8; 20]); // signature, not verified
        push_u32(&mut out, file_size as u32);
        push_u32(&mut out, HEADER_SIZE as u32);
        push_u32(&mut out, 0x12345678); // endian_tag
        push_u32(&mut out, 0); // link_size
        push_u32(&mut out, 0); // link_off
        push_u32(&mut out, 0); // map_off
        let section = |out: &mut Vec<u8>, len: usize, off: usize| {
            push_u32(out, len as u32);
            push_u32(out, if len == 0 { 0 } else { off as u32 });
        };
        section(&mut out, self.strings.len(), string_ids_off);
        section(&mut out, self.types.len(), type_ids_off);
        section(&mut out, self.protos.len(), proto_ids_off);
        section(&mut out, self.fields.len(), field_ids_off);
        section(&mut out, self.methods.len(), method_ids_off);
        section(&mut out, self.classes.len(), class_defs_off);
        push_u32(&mut out, data.len() as u32);
        push_u32(&mut out, if data.is_empty() { 0 } else { data_off as u32 });
        assert_eq!(out.len(), HEADER_SIZE);

        for off in string_offs {
            push_u32(&mut out, off);
        }
        for &descriptor_idx in &self.types {
            push_u32(&mut out, descriptor_idx);
        }
        for (i, (shorty_idx, return_type_idx, _)) in self.protos.iter().enumerate() {
            push_u32(&mut out, *shorty_idx);
            push_u32(&mut out, *return_type_idx);
            push_u32(&mut out, proto_param_offs[i]);
        }
        for &(class_idx, type_idx, name_idx) in &self.fields {
            push_u16(&mut out, class_idx);
            push_u16(&mut out, type_idx);
            push_u32(&mut out, name_idx);
        }
        for &(class_idx, proto_idx, name_idx) in &self.methods {
            push_u16(&mut out, class_idx);
            push_u16(&mut out, proto_idx);
            push_u32(&mut out, name_idx);
        }
        for (class, offs) in self.classes.iter().zip(&class_offs) {
            push_u32(&mut out, class.class_idx);
            push_u32(&mut out, class.access_flags);
            push_u32(&mut out, class.superclass_idx);
            push_u32(&mut out, offs.interfaces_off);
            push_u32(&mut out, class.source_file_idx);
            push_u32(&mut out, 0); // annotations_off
            push_u32(&mut out, offs.class_data_off);
            push_u32(&mut out, offs.static_values_off);
        }

        out.extend_from_slice(&data);
        assert_eq!(out.len(), file_size);
        out
    }
}

/// A one-class image: `LHello;` extends `Ljava/lang/Object;` with a
/// constructor and a `void hello()` whose body is a single `return-void`.
pub fn hello_dex() -> DexBuilder {
    let mut builder = DexBuilder::new();
    builder.strings = vec![
        "<init>".to_string(),       // 0
        "Hello.java".to_string(),   // 1
        "LHello;".to_string(),      // 2
        "Ljava/lang/Object;".to_string(), // 3
        "V".to_string(),            // 4
        "hello".to_string(),        // 5
    ];
    builder.types = vec![2, 3, 4]; // LHello;, Ljava/lang/Object;, V
    builder.protos = vec![(4, 2, Vec::new())]; // ()V
    builder.methods = vec![
        (0, 0, 0), // LHello;.<init>
        (0, 0, 5), // LHello;.hello
    ];

    let mut class = ClassSpec::new(0, 1);
    class.source_file_idx = 1;
    class.direct_methods = vec![
        MethodSpec::new(0, ACC_PUBLIC | ACC_CONSTRUCTOR, Some(vec![0x000E])),
        MethodSpec::new(1, ACC_PUBLIC, Some(vec![0x000E])),
    ];
    builder.classes = vec![class];
    builder
}
