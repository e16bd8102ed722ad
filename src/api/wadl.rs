//! WADL description of the dataselect service

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::io::Cursor;

type XmlWriter = Writer<Cursor<Vec<u8>>>;
type XmlResult = Result<(), quick_xml::Error>;

/// (name, xsd type, required)
const QUERY_PARAMETERS: &[(&str, &str, bool)] = &[
    ("starttime", "xsd:dateTime", true),
    ("endtime", "xsd:dateTime", true),
    ("network", "xsd:string", false),
    ("station", "xsd:string", false),
    ("location", "xsd:string", false),
    ("channel", "xsd:string", false),
    ("quality", "xsd:string", false),
    ("format", "xsd:string", false),
    ("nodata", "xsd:int", false),
];

fn start(writer: &mut XmlWriter, name: &str, attributes: &[(&str, &str)]) -> XmlResult {
    let element = BytesStart::new(name).with_attributes(attributes.iter().copied());
    writer.write_event(Event::Start(element))
}

fn empty(writer: &mut XmlWriter, name: &str, attributes: &[(&str, &str)]) -> XmlResult {
    let element = BytesStart::new(name).with_attributes(attributes.iter().copied());
    writer.write_event(Event::Empty(element))
}

fn end(writer: &mut XmlWriter, name: &str) -> XmlResult {
    writer.write_event(Event::End(BytesEnd::new(name)))
}

fn response(writer: &mut XmlWriter, status: &str, media_type: &str) -> XmlResult {
    start(writer, "response", &[("status", status)])?;
    empty(writer, "representation", &[("mediaType", media_type)])?;
    end(writer, "response")
}

fn query_resource(writer: &mut XmlWriter, path: &str) -> XmlResult {
    start(writer, "resource", &[("path", path)])?;

    start(writer, "method", &[("name", "GET")])?;
    start(writer, "request", &[])?;
    for &(name, kind, required) in QUERY_PARAMETERS {
        empty(
            writer,
            "param",
            &[
                ("name", name),
                ("style", "query"),
                ("type", kind),
                ("required", if required { "true" } else { "false" }),
            ],
        )?;
    }
    end(writer, "request")?;
    response(writer, "200", "application/vnd.fdsn.mseed")?;
    response(writer, "204 400 401 404 500", "text/plain")?;
    end(writer, "method")?;

    start(writer, "method", &[("name", "POST")])?;
    start(writer, "request", &[])?;
    empty(writer, "representation", &[("mediaType", "application/x-www-form-urlencoded")])?;
    end(writer, "request")?;
    response(writer, "200", "application/vnd.fdsn.mseed")?;
    response(writer, "204 400 401 404 500", "text/plain")?;
    end(writer, "method")?;

    end(writer, "resource")
}

fn plain_resource(writer: &mut XmlWriter, path: &str, media_type: &str) -> XmlResult {
    start(writer, "resource", &[("path", path)])?;
    start(writer, "method", &[("name", "GET")])?;
    response(writer, "200", media_type)?;
    end(writer, "method")?;
    end(writer, "resource")
}

/// Render the WADL document for a service rooted at `base_url`
pub fn render(base_url: &str) -> Result<Vec<u8>, quick_xml::Error> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    start(
        &mut writer,
        "application",
        &[
            ("xmlns", "http://wadl.dev.java.net/2009/02"),
            ("xmlns:xsd", "http://www.w3.org/2001/XMLSchema"),
        ],
    )?;
    start(&mut writer, "resources", &[("base", base_url)])?;

    plain_resource(&mut writer, "", "text/html")?;
    query_resource(&mut writer, "query")?;
    query_resource(&mut writer, "queryauth")?;
    plain_resource(&mut writer, "version", "text/plain")?;
    plain_resource(&mut writer, "application.wadl", "application/xml")?;

    end(&mut writer, "resources")?;
    end(&mut writer, "application")?;

    Ok(writer.into_inner().into_inner())
}
