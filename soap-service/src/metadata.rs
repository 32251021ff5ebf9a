//! Metadata generation (spec §4.1 steps 4-5, §6): WSDL emission and the file-backed
//! XSD lookup. Thin relative to the dispatch pipeline, per spec §1 — this module
//! renders the already-built [`ServiceDescription`] into a WSDL 1.1 document; it does
//! not attempt a general-purpose XSD type system.

use crate::model::ServiceDescription;
use std::path::{Component, Path};

/// The file-backed metadata mapping from spec §6's `WsdlFileOptions`.
#[derive(Debug, Clone, Default)]
pub struct WsdlFileOptions {
    pub app_path: Option<String>,
    pub virtual_path: Option<String>,
    pub url_override: Option<String>,
    pub schema_folder: Option<String>,
    pub wsdl_folder: Option<String>,
    pub wsdl_file: Option<String>,
}

/// Errors raised while resolving a `?xsd&name=` request (spec §6's path-traversal
/// defense). Reported as a direct HTTP response by the router, never as a SOAP
/// fault (spec §7: "errors outside this window... reported as HTTP responses
/// directly").
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("the xsd name `{0}` is not a valid filename")]
    InvalidXsdName(String),
    #[error("no file-based WSDL mapping is configured")]
    NoFileMapping,
    #[error("failed to read schema file: {0}")]
    Io(String),
}

/// Validates the `name` query parameter of a `?xsd&name=<file>.xsd` request: it must
/// equal its own filename-only projection (no directory components survive a
/// round-trip through `Path::file_name`) and must contain `.xsd` (spec §6).
pub fn validate_xsd_name(name: &str) -> Result<&str, MetadataError> {
    if !name.contains(".xsd") {
        return Err(MetadataError::InvalidXsdName(name.to_string()));
    }
    let lower = name.to_ascii_lowercase();
    if name.contains('/') || name.contains('\\') || lower.contains("%2f") || lower.contains("%5c") {
        return Err(MetadataError::InvalidXsdName(name.to_string()));
    }
    let path = Path::new(name);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(only)), None) if only == name => Ok(name),
        _ => Err(MetadataError::InvalidXsdName(name.to_string())),
    }
}

/// Reads an XSD file from the configured schema folder, after validating `name`.
pub fn read_xsd(options: &WsdlFileOptions, name: &str) -> Result<Vec<u8>, MetadataError> {
    let validated = validate_xsd_name(name)?;
    let folder = options
        .schema_folder
        .as_deref()
        .ok_or(MetadataError::NoFileMapping)?;
    std::fs::read(Path::new(folder).join(validated)).map_err(|e| MetadataError::Io(e.to_string()))
}

/// Reads a pre-built WSDL document from the configured file mapping, if any.
pub fn read_wsdl_file(options: &WsdlFileOptions) -> Result<Vec<u8>, MetadataError> {
    let folder = options.wsdl_folder.as_deref().ok_or(MetadataError::NoFileMapping)?;
    let file = options.wsdl_file.as_deref().ok_or(MetadataError::NoFileMapping)?;
    std::fs::read(Path::new(folder).join(file)).map_err(|e| MetadataError::Io(e.to_string()))
}

/// Maps a parameter's declared Rust type name to the closest XSD primitive. Used
/// only for the generated `<xsd:element>` type hints; unknown types fall back to
/// `xsd:string` (the teacher's `rust_type_to_xsd_type` convention, generalized).
pub fn rust_type_to_xsd_type(rust_type: &str) -> &'static str {
    match rust_type {
        "i8" | "i16" | "i32" => "xsd:int",
        "i64" => "xsd:long",
        "u8" | "u16" | "u32" => "xsd:unsignedInt",
        "u64" => "xsd:unsignedLong",
        "f32" => "xsd:float",
        "f64" => "xsd:double",
        "String" | "str" => "xsd:string",
        "bool" => "xsd:boolean",
        _ => "xsd:string",
    }
}

/// Generates a WSDL 1.1 document describing every contract/operation in
/// `service`, bound at HTTP `endpoint_path`. `use_basic_authentication` only
/// affects the emitted documentation annotation (spec §4.3: "an opaque 'uses
/// basic auth' flag only influences metadata").
pub fn generate_wsdl(
    service: &ServiceDescription,
    endpoint_path: &str,
    soap12: bool,
    use_basic_authentication: bool,
) -> String {
    let mut messages = String::new();
    let mut port_type_ops = String::new();
    let mut binding_ops = String::new();
    let mut service_ports = String::new();

    let soap_ns = if soap12 {
        "http://schemas.xmlsoap.org/wsdl/soap12/"
    } else {
        "http://schemas.xmlsoap.org/wsdl/soap/"
    };

    for contract in &service.contracts {
        for op in &contract.operations {
            let in_params: String = op
                .in_parameters()
                .map(|p| format!("<xsd:element name=\"{}\" type=\"xsd:string\"/>", p.name))
                .collect();

            messages.push_str(&format!(
                "<message name=\"{op_name}Request\"><part name=\"parameters\" element=\"tns:{op_name}\"/></message>\n",
                op_name = op.name
            ));
            if !op.is_one_way {
                messages.push_str(&format!(
                    "<message name=\"{op_name}Response\"><part name=\"parameters\" element=\"tns:{op_name}Response\"/></message>\n",
                    op_name = op.name
                ));
            }
            let _ = in_params; // element-level XSD for request bodies is out of scope (thin metadata).

            port_type_ops.push_str(&format!(
                "<operation name=\"{op_name}\"><input message=\"tns:{op_name}Request\"/>{output}</operation>\n",
                op_name = op.name,
                output = if op.is_one_way {
                    String::new()
                } else {
                    format!("<output message=\"tns:{op_name}Response\"/>", op_name = op.name)
                }
            ));

            binding_ops.push_str(&format!(
                concat!(
                    "<operation name=\"{op_name}\">",
                    "<soap:operation soapAction=\"{action}\" style=\"document\"/>",
                    "<input><soap:body use=\"literal\"/></input>",
                    "{output}",
                    "</operation>\n"
                ),
                op_name = op.name,
                action = op.soap_action,
                output = if op.is_one_way {
                    String::new()
                } else {
                    "<output><soap:body use=\"literal\"/></output>".to_string()
                },
                soap = "soap",
            ));
        }

        service_ports.push_str(&format!(
            "<port name=\"{name}Port\" binding=\"tns:{name}Binding\"><soap:address location=\"{endpoint_path}\"/></port>\n",
            name = contract.name,
        ));
    }

    let auth_note = if use_basic_authentication {
        "<documentation>This service requires HTTP Basic authentication.</documentation>"
    } else {
        ""
    };

    let target_ns = service
        .contracts
        .first()
        .map(|c| c.target_namespace.as_str())
        .unwrap_or("");

    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<wsdl:definitions xmlns:wsdl=\"http://schemas.xmlsoap.org/wsdl/\"\n",
            "                  xmlns:soap=\"{soap_ns}\"\n",
            "                  xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\"\n",
            "                  xmlns:tns=\"{target_ns}\"\n",
            "                  targetNamespace=\"{target_ns}\">\n",
            "{auth_note}\n",
            "<wsdl:types><xsd:schema targetNamespace=\"{target_ns}\"/></wsdl:types>\n",
            "{messages}",
            "<wsdl:portType name=\"ServicePortType\">{port_type_ops}</wsdl:portType>\n",
            "<wsdl:binding name=\"ServiceBinding\" type=\"tns:ServicePortType\">",
            "<soap:binding transport=\"http://schemas.xmlsoap.org/soap/http\" style=\"document\"/>",
            "{binding_ops}</wsdl:binding>\n",
            "<wsdl:service name=\"SoapService\">{service_ports}</wsdl:service>\n",
            "</wsdl:definitions>"
        ),
        soap_ns = soap_ns,
        target_ns = target_ns,
        auth_note = auth_note,
        messages = messages,
        port_type_ops = port_type_ops,
        binding_ops = binding_ops,
        service_ports = service_ports,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_path_traversal_xsd_name() {
        assert!(validate_xsd_name("../etc/passwd").is_err());
        assert!(validate_xsd_name("..%2Fetc%2Fpasswd.xsd").is_err());
    }

    #[test]
    fn accepts_plain_xsd_name() {
        assert_eq!(validate_xsd_name("types.xsd").unwrap(), "types.xsd");
    }

    #[test]
    fn rejects_name_without_xsd_extension() {
        assert!(validate_xsd_name("types.txt").is_err());
    }
}
