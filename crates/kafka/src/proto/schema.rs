use crate::error::{Error, Result};
use protobuf::descriptor::field_descriptor_proto::{Label, Type};
use protobuf::descriptor::{
    DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto,
};
use protobuf::reflect::{FileDescriptor, MessageDescriptor};
use protobuf_parse::Parser;
use std::fmt::Write as _;
use std::path::Path;

/// A `.proto` file parsed at runtime into reflective descriptors.
///
/// Messages built from these descriptors are dynamic: they encode and decode
/// like generated code without a build step.
#[derive(Clone)]
pub struct ProtoSchema {
    files: Vec<FileDescriptor>,
}

impl ProtoSchema {
    /// Parse a .proto file and create a schema
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();

        let mut parser = Parser::new();
        parser.input(p);
        if let Some(parent) = p.parent() {
            parser.include(parent);
        }

        let parsed = parser
            .parse_and_typecheck()
            .map_err(|e| Error::ProtobufParse(e.to_string()))?;

        let files = FileDescriptor::new_dynamic_fds(parsed.file_descriptors, &[])
            .map_err(|e| Error::ProtobufParse(e.to_string()))?;
        Ok(ProtoSchema { files })
    }

    /// Parse a .proto file content from string
    pub fn from_string(content: &str) -> Result<Self> {
        use std::io::Write;

        let mut temp_file = tempfile::Builder::new()
            .suffix(".proto")
            .tempfile()
            .map_err(|e| Error::ProtobufParse(format!("Failed to create temp file: {e}")))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| Error::ProtobufParse(format!("Failed to write temp file: {e}")))?;

        Self::from_file(temp_file.path())
    }

    /// Build a schema from an already parsed file descriptor.
    pub fn from_descriptor_proto(proto: FileDescriptorProto) -> Result<Self> {
        let file = FileDescriptor::new_dynamic(proto, &[])
            .map_err(|e| Error::ProtobufParse(e.to_string()))?;
        Ok(ProtoSchema { files: vec![file] })
    }

    /// Look up a message by package-relative (`Outer.Inner`) or full name.
    pub fn message(&self, name: &str) -> Result<MessageDescriptor> {
        let full_name = format!(".{}", name.trim_start_matches('.'));
        self.files
            .iter()
            .find_map(|file| {
                file.message_by_package_relative_name(name)
                    .or_else(|| file.message_by_full_name(&full_name))
            })
            .ok_or_else(|| Error::MessageTypeNotFound(name.to_string()))
    }

    /// Full names of all top-level messages.
    pub fn list_messages(&self) -> Vec<String> {
        self.files
            .iter()
            .flat_map(|file| file.messages())
            .map(|message| message.full_name().to_string())
            .collect()
    }

    pub fn files(&self) -> &[FileDescriptor] {
        &self.files
    }
}

/// Render a file descriptor back to `.proto` source.
///
/// Used to register protobuf schemas, which the registry accepts as text.
pub fn render_proto(file: &FileDescriptorProto) -> String {
    let mut out = String::new();
    let syntax = if file.syntax().is_empty() {
        "proto2"
    } else {
        file.syntax()
    };
    let _ = writeln!(out, "syntax = \"{syntax}\";");
    if !file.package().is_empty() {
        let _ = writeln!(out, "package {};", file.package());
    }
    for dependency in &file.dependency {
        let _ = writeln!(out, "import \"{dependency}\";");
    }
    let proto3 = syntax == "proto3";
    for enumeration in &file.enum_type {
        out.push('\n');
        render_enum(&mut out, enumeration, 0);
    }
    for message in &file.message_type {
        out.push('\n');
        render_message(&mut out, message, proto3, 0);
    }
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn render_enum(out: &mut String, enumeration: &EnumDescriptorProto, depth: usize) {
    indent(out, depth);
    let _ = writeln!(out, "enum {} {{", enumeration.name());
    for value in &enumeration.value {
        indent(out, depth + 1);
        let _ = writeln!(out, "{} = {};", value.name(), value.number());
    }
    indent(out, depth);
    out.push_str("}\n");
}

fn render_message(out: &mut String, message: &DescriptorProto, proto3: bool, depth: usize) {
    indent(out, depth);
    let _ = writeln!(out, "message {} {{", message.name());

    for nested in &message.nested_type {
        if !nested.options.map_entry() {
            render_message(out, nested, proto3, depth + 1);
        }
    }
    for enumeration in &message.enum_type {
        render_enum(out, enumeration, depth + 1);
    }

    let in_real_oneof =
        |field: &FieldDescriptorProto| field.has_oneof_index() && !field.proto3_optional();

    for field in message.field.iter().filter(|f| !in_real_oneof(f)) {
        render_field(out, message, field, proto3, depth + 1);
    }
    for (index, oneof) in message.oneof_decl.iter().enumerate() {
        let members: Vec<_> = message
            .field
            .iter()
            .filter(|f| in_real_oneof(f) && f.oneof_index() as usize == index)
            .collect();
        if members.is_empty() {
            continue;
        }
        indent(out, depth + 1);
        let _ = writeln!(out, "oneof {} {{", oneof.name());
        for field in members {
            indent(out, depth + 2);
            let _ = writeln!(
                out,
                "{} {} = {};",
                type_name(field),
                field.name(),
                field.number()
            );
        }
        indent(out, depth + 1);
        out.push_str("}\n");
    }

    indent(out, depth);
    out.push_str("}\n");
}

fn render_field(
    out: &mut String,
    message: &DescriptorProto,
    field: &FieldDescriptorProto,
    proto3: bool,
    depth: usize,
) {
    indent(out, depth);
    if let Some(entry) = map_entry(message, field) {
        let key = entry.field.iter().find(|f| f.number() == 1);
        let value = entry.field.iter().find(|f| f.number() == 2);
        if let (Some(key), Some(value)) = (key, value) {
            let _ = writeln!(
                out,
                "map<{}, {}> {} = {};",
                type_name(key),
                type_name(value),
                field.name(),
                field.number()
            );
            return;
        }
    }

    let label = match field.label() {
        Label::LABEL_REPEATED => "repeated ",
        Label::LABEL_REQUIRED => "required ",
        Label::LABEL_OPTIONAL if !proto3 || field.proto3_optional() => "optional ",
        Label::LABEL_OPTIONAL => "",
    };
    let _ = writeln!(
        out,
        "{label}{} {} = {};",
        type_name(field),
        field.name(),
        field.number()
    );
}

fn map_entry<'a>(
    message: &'a DescriptorProto,
    field: &FieldDescriptorProto,
) -> Option<&'a DescriptorProto> {
    if field.label() != Label::LABEL_REPEATED || field.type_() != Type::TYPE_MESSAGE {
        return None;
    }
    let simple = field.type_name().rsplit('.').next()?;
    message
        .nested_type
        .iter()
        .find(|nested| nested.name() == simple && nested.options.map_entry())
}

fn type_name(field: &FieldDescriptorProto) -> String {
    let name = match field.type_() {
        Type::TYPE_DOUBLE => "double",
        Type::TYPE_FLOAT => "float",
        Type::TYPE_INT64 => "int64",
        Type::TYPE_UINT64 => "uint64",
        Type::TYPE_INT32 => "int32",
        Type::TYPE_FIXED64 => "fixed64",
        Type::TYPE_FIXED32 => "fixed32",
        Type::TYPE_BOOL => "bool",
        Type::TYPE_STRING => "string",
        Type::TYPE_BYTES => "bytes",
        Type::TYPE_UINT32 => "uint32",
        Type::TYPE_SFIXED32 => "sfixed32",
        Type::TYPE_SFIXED64 => "sfixed64",
        Type::TYPE_SINT32 => "sint32",
        Type::TYPE_SINT64 => "sint64",
        Type::TYPE_MESSAGE | Type::TYPE_ENUM | Type::TYPE_GROUP => {
            return field.type_name().to_string()
        }
    };
    name.to_string()
}
