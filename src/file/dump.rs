use log::warn;
use std::io::{self, Write};

use super::{Dex, DexClass, Prototype};
use crate::dex::{AccessFlags, FlagKind, NO_INDEX};
use crate::insns::{self, Index, Insn, InsnFormat};

pub mod prettify {

    #[derive(Copy, Clone, PartialEq, Eq)]
    pub enum Field {
        WithType,
        NoType,
    }

    #[derive(Copy, Clone, PartialEq, Eq)]
    pub enum Method {
        WithSig,
        NoSig,
    }
}

/// Converts a type descriptor into the Java-style source name,
/// e.g. `[Ljava/lang/String;` becomes `java.lang.String[]`.
pub fn pretty_desc(desc: &str) -> String {
    let dim = desc.chars().filter(|c| *c == '[').count();
    let name = &desc[dim..];
    let mut output = String::new();

    if name.starts_with('L') {
        let end_idx = if name.ends_with(';') {
            name.len() - 1
        } else {
            name.len()
        };
        output.push_str(&name[1..end_idx].replace('/', "."));
    } else if name.is_empty() {
        output.push_str(desc);
    } else {
        output.push_str(match name.as_bytes()[0] {
            b'B' => "byte",
            b'C' => "char",
            b'D' => "double",
            b'F' => "float",
            b'I' => "int",
            b'J' => "long",
            b'S' => "short",
            b'Z' => "boolean",
            b'V' => "void",
            _ => name,
        });
    }

    if dim > 0 {
        output.push_str(&"[]".repeat(dim));
    }
    output
}

impl Dex {
    pub fn pretty_type_at(&self, type_idx: u32) -> String {
        match self.get_type_desc(type_idx) {
            Ok(desc) => pretty_desc(desc),
            Err(_) => format!("<<invalid-type-idx-{type_idx}>>"),
        }
    }

    fn raw_type_at(&self, type_idx: u32) -> String {
        match self.get_type_desc(type_idx) {
            Ok(desc) => desc.to_string(),
            Err(_) => format!("<<invalid-type-idx-{type_idx}>>"),
        }
    }

    pub fn pretty_string_at(&self, idx: u32) -> String {
        match self.get_string(idx) {
            Ok(s) => s.to_string(),
            Err(_) => format!("<<invalid-string-idx-{idx}>>"),
        }
    }

    pub fn pretty_field_at(&self, field_idx: u32, opts: prettify::Field) -> String {
        match self.pretty_field_opt(field_idx, opts) {
            Ok(s) => s,
            Err(_) => format!("<<invalid-field-idx-{field_idx}>>"),
        }
    }

    fn pretty_field_opt(&self, field_idx: u32, opts: prettify::Field) -> crate::Result<String> {
        let field_id = self.get_field_id(field_idx)?;
        let mut result = String::new();
        if opts == prettify::Field::WithType {
            result.push_str(&self.pretty_type_at(field_id.type_idx as u32));
            result.push(' ');
        }
        result.push_str(&self.pretty_type_at(field_id.class_idx as u32));
        result.push('.');
        result.push_str(self.get_string(field_id.name_idx)?);
        Ok(result)
    }

    pub fn pretty_method_at(&self, method_idx: u32, opts: prettify::Method) -> String {
        match self.pretty_method_opt(method_idx, opts) {
            Ok(s) => s,
            Err(_) => format!("<<invalid-method-idx-{method_idx}>>"),
        }
    }

    fn pretty_method_opt(&self, method_idx: u32, opts: prettify::Method) -> crate::Result<String> {
        let method_id = self.get_method_id(method_idx)?;
        let proto = match opts {
            prettify::Method::WithSig => Some(self.get_proto(method_id.proto_idx as u32)?),
            prettify::Method::NoSig => None,
        };

        let mut result = String::new();
        if let Some(proto) = proto {
            result.push_str(&self.pretty_type_at(proto.return_type_idx));
            result.push(' ');
        }

        result.push_str(&self.pretty_type_at(method_id.class_idx as u32));
        result.push('.');
        result.push_str(self.get_string(method_id.name_idx)?);

        if let Some(proto) = proto {
            result.push('(');
            for (i, &param) in proto.parameters.iter().enumerate() {
                if i > 0 {
                    result.push_str(", ");
                }
                result.push_str(&self.pretty_type_at(param as u32));
            }
            result.push(')');
        }
        Ok(result)
    }

    fn pretty_proto(&self, proto: &Prototype) -> String {
        let mut result = String::from("(");
        for (i, &param) in proto.parameters.iter().enumerate() {
            if i > 0 {
                result.push_str(", ");
            }
            result.push_str(&self.pretty_type_at(param as u32));
        }
        result.push(')');
        result.push_str(&self.pretty_type_at(proto.return_type_idx));
        result
    }

    /// Resolves a symbolic instruction operand into rendered text, always
    /// trailing the raw index for cross-checking against other tools.
    fn pretty_index(&self, index: &Index) -> String {
        match index {
            Index::String(idx) => match self.get_string(*idx) {
                Ok(s) => format!("{:?} // string@{}", s, idx),
                Err(_) => format!("<<invalid-string-idx-{idx}>>"),
            },
            Index::Type(idx) => format!("{} // type@{}", self.pretty_type_at(*idx), idx),
            Index::Field(idx) => format!(
                "{} // field@{}",
                self.pretty_field_at(*idx, prettify::Field::WithType),
                idx
            ),
            Index::Method(idx) => format!(
                "{} // method@{}",
                self.pretty_method_at(*idx, prettify::Method::WithSig),
                idx
            ),
            Index::Proto(idx) => match self.get_proto(*idx) {
                Ok(proto) => {
                    format!("{} // proto@{}", self.pretty_string_at(proto.shorty_idx), idx)
                }
                Err(_) => format!("<<invalid-proto-idx-{idx}>>"),
            },
            Index::CallSite(idx) => format!("call_site@{}", idx),
            Index::MethodHandle(idx) => format!("method_handle@{}", idx),
            Index::Unknown(raw) => format!("thing@{}", raw),
        }
    }

    /// Writes the whole object model in file-table order: types,
    /// prototypes, then classes with their fields, methods, and method
    /// bodies.
    pub fn write_dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "Types:")?;
        for i in 0..self.types.len() {
            writeln!(w, "  #{} {}", i, self.raw_type_at(i as u32))?;
        }

        writeln!(w, "Prototypes:")?;
        for (i, proto) in self.prototypes.iter().enumerate() {
            writeln!(w, "  #{} {}", i, self.pretty_proto(proto))?;
        }

        writeln!(w, "Classes:")?;
        for class in &self.classes {
            self.write_class(w, class)?;
        }
        Ok(())
    }

    /// Like [Dex::write_dump], to stdout.
    pub fn dump(&self) -> io::Result<()> {
        let stdout = io::stdout();
        self.write_dump(&mut stdout.lock())
    }

    fn write_class<W: Write>(&self, w: &mut W, class: &DexClass) -> io::Result<()> {
        let flags = AccessFlags::from_bits_truncate(class.def.access_flags);
        let keywords = flags.keywords(FlagKind::Class);
        write!(w, "\n.class")?;
        if !keywords.is_empty() {
            write!(w, " {}", keywords)?;
        }
        write!(w, " {}", self.raw_type_at(class.def.class_idx))?;
        if class.def.superclass_idx != NO_INDEX {
            write!(w, " extends {}", self.raw_type_at(class.def.superclass_idx))?;
        }
        writeln!(w)?;

        for &iface in &class.interfaces {
            writeln!(w, ".implements {}", self.raw_type_at(iface as u32))?;
        }
        if class.def.source_file_idx != NO_INDEX {
            writeln!(w, ".source {:?}", self.pretty_string_at(class.def.source_file_idx))?;
        }

        for field in class.fields() {
            let keywords = field.access_flags.keywords(FlagKind::Field);
            write!(w, ".field")?;
            if !keywords.is_empty() {
                write!(w, " {}", keywords)?;
            }
            writeln!(
                w,
                " {}",
                self.pretty_field_at(field.field_idx, prettify::Field::WithType)
            )?;
        }
        if !class.static_values.is_empty() {
            writeln!(w, ".static-values {:?}", class.static_values)?;
        }

        for method in class.methods() {
            let keywords = method.access_flags.keywords(FlagKind::Method);
            write!(w, ".method")?;
            if !keywords.is_empty() {
                write!(w, " {}", keywords)?;
            }
            writeln!(
                w,
                " {}",
                self.pretty_method_at(method.method_idx, prettify::Method::WithSig)
            )?;

            if let Some(code) = &method.code {
                writeln!(w, "    .registers {}", code.registers_size)?;
                let listing = insns::disasm(code);
                for insn in &listing.insns {
                    writeln!(w, "    |{:04x}| {}", insn.offset, insn.to_string(self))?;
                }
                if let Some(err) = &listing.error {
                    warn!(
                        "disassembly of method@{} stopped early: {}",
                        method.method_idx, err
                    );
                    writeln!(w, "    # disassembly stopped: {}", err)?;
                }
            }
            writeln!(w, ".end method")?;
        }
        Ok(())
    }
}

impl Insn {
    /// Renders one instruction with symbolic operands resolved against
    /// `dex`.
    pub fn to_string(&self, dex: &Dex) -> String {
        let opcode = self.opcode.name;
        match &self.format {
            InsnFormat::Format10x | InsnFormat::Format00x => opcode.to_string(),
            InsnFormat::Format12x { a, b } => format!("{opcode} v{a}, v{b}"),
            InsnFormat::Format11n { a, b } => format!("{opcode} v{a}, #{b:+}"),
            InsnFormat::Format11x { a } => format!("{opcode} v{a}"),
            InsnFormat::Format10t { a } => format!("{opcode} {a:+}"),
            InsnFormat::Format20t { a } => format!("{opcode} {a:+}"),
            InsnFormat::Format22x { a, b } => format!("{opcode} v{a}, v{b}"),
            InsnFormat::Format21t { a, b } => format!("{opcode} v{a}, {b:+}"),
            InsnFormat::Format21s { a, b } => format!("{opcode} v{a}, #{b:+}"),
            InsnFormat::Format21h { a, b } => {
                // op vAA, #+BBBB0000[00000000]
                if self.opcode.value == 0x15 {
                    let value = ((*b as u16) as u32) << 16;
                    format!("{opcode} v{a}, #int {value:+} // {value:#x}", value = value as i32)
                } else {
                    let value = ((*b as u16) as u64) << 48;
                    format!("{opcode} v{a}, #long {value:+} // {value:#x}", value = value as i64)
                }
            }
            InsnFormat::Format21c { a, b } => format!("{opcode} v{a}, {}", dex.pretty_index(b)),
            InsnFormat::Format23x { a, b, c } => format!("{opcode} v{a}, v{b}, v{c}"),
            InsnFormat::Format22b { a, b, c } => format!("{opcode} v{a}, v{b}, #{c:+}"),
            InsnFormat::Format22t { a, b, c } => format!("{opcode} v{a}, v{b}, {c:+}"),
            InsnFormat::Format22s { a, b, c } => format!("{opcode} v{a}, v{b}, #{c:+}"),
            InsnFormat::Format22c { a, b, c } => {
                format!("{opcode} v{a}, v{b}, {}", dex.pretty_index(c))
            }
            InsnFormat::Format30t { a } => format!("{opcode} {a:+}"),
            InsnFormat::Format32x { a, b } => format!("{opcode} v{a}, v{b}"),
            InsnFormat::Format31i { a, b } => format!("{opcode} v{a}, #{b:+}"),
            InsnFormat::Format31t { a, b } => format!("{opcode} v{a}, {b:+}"),
            InsnFormat::Format31c { a, b } => format!("{opcode} v{a}, {}", dex.pretty_index(b)),
            InsnFormat::Format35c { b, regs } => {
                format!("{opcode} {{{}}}, {}", reg_list(regs), dex.pretty_index(b))
            }
            InsnFormat::Format3rc { b, first, count } => format!(
                "{opcode} {{v{} .. v{}}}, {}",
                first,
                *first as u32 + count.saturating_sub(1) as u32,
                dex.pretty_index(b)
            ),
            InsnFormat::Format45cc { b, h, regs } => format!(
                "{opcode} {{{}}}, {}, {}",
                reg_list(regs),
                dex.pretty_index(b),
                dex.pretty_index(h)
            ),
            InsnFormat::Format4rcc { b, h, first, count } => format!(
                "{opcode} {{v{} .. v{}}}, {}, {}",
                first,
                *first as u32 + count.saturating_sub(1) as u32,
                dex.pretty_index(b),
                dex.pretty_index(h)
            ),
            InsnFormat::Format51l { a, b } => format!("{opcode} v{a}, #{b:+}"),
        }
    }
}

fn reg_list(regs: &[u8]) -> String {
    regs.iter()
        .map(|reg| format!("v{}", reg))
        .collect::<Vec<String>>()
        .join(", ")
}
