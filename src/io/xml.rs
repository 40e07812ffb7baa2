//! The event loop and attribute helpers shared by the XML dialect readers.
use std::borrow::Cow;
use std::fmt::Debug;
use std::io::{BufReader, Read};
use std::str::FromStr;

use log::debug;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Reader;

use crate::params::{curie_to_num, ControlledVocabulary, CvParam, Unit, CURIE};
use crate::spectrum::bindata::Bytes;

use super::traits::{ElementSource, ScanAccessError, SpectrumBuilding};

const BUFFER_CAPACITY: usize = 64 * 1024;

/// A handler for the SAX events of one XML dialect.
///
/// Each callback receives the current parser state and returns the next one.
/// Once a callback has completed an element, [`XmlSAX::take_finished`] hands
/// it over.
pub trait XmlSAX {
    type State: Copy + Debug;
    type Error: std::error::Error + Send + Sync + 'static;
    type Output;

    fn start_element(&mut self, event: &BytesStart, state: Self::State)
        -> Result<Self::State, Self::Error>;

    fn empty_element(&mut self, event: &BytesStart, state: Self::State)
        -> Result<Self::State, Self::Error>;

    fn end_element(&mut self, event: &BytesEnd, state: Self::State)
        -> Result<Self::State, Self::Error>;

    fn text(&mut self, event: &BytesText, state: Self::State) -> Result<Self::State, Self::Error>;

    fn take_finished(&mut self) -> Option<Self::Output>;

    fn handle_xml_error(&self, error: quick_xml::Error, state: Self::State) -> Self::Error;

    /// Called once the document ends, to report an element left open
    fn finish(&mut self, _state: Self::State) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Drives a [`XmlSAX`] handler over a stream one element at a time
pub struct XmlEventReader<R: Read, H: XmlSAX> {
    reader: Reader<BufReader<R>>,
    buffer: Bytes,
    state: H::State,
    pub(crate) handler: H,
    done: bool,
}

impl<R: Read, H: XmlSAX + Debug> Debug for XmlEventReader<R, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlEventReader")
            .field("state", &self.state)
            .field("handler", &self.handler)
            .field("done", &self.done)
            .finish()
    }
}

impl<R: Read, H: XmlSAX> XmlEventReader<R, H> {
    pub(crate) fn new(stream: R, handler: H, state: H::State) -> Self {
        let mut reader = Reader::from_reader(BufReader::with_capacity(BUFFER_CAPACITY, stream));
        reader.trim_text(true);
        Self {
            reader,
            buffer: Bytes::new(),
            state,
            handler,
            done: false,
        }
    }

    pub fn state(&self) -> H::State {
        self.state
    }

    /// Read events until the handler completes an element or the document ends.
    ///
    /// An error ends the pass.
    pub(crate) fn next_finished(&mut self) -> Option<Result<H::Output, H::Error>> {
        if self.done {
            return None;
        }
        loop {
            let result = match self.reader.read_event_into(&mut self.buffer) {
                Ok(Event::Start(ref e)) => self.handler.start_element(e, self.state),
                Ok(Event::Empty(ref e)) => self.handler.empty_element(e, self.state),
                Ok(Event::End(ref e)) => self.handler.end_element(e, self.state),
                Ok(Event::Text(ref e)) => self.handler.text(e, self.state),
                Ok(Event::Eof) => {
                    self.done = true;
                    return match self.handler.finish(self.state) {
                        Ok(()) => None,
                        Err(e) => Some(Err(e)),
                    };
                }
                Ok(_) => Ok(self.state),
                Err(err) => Err(self.handler.handle_xml_error(err, self.state)),
            };
            self.buffer.clear();
            match result {
                Ok(state) => {
                    self.state = state;
                    if let Some(output) = self.handler.take_finished() {
                        return Some(Ok(output));
                    }
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

impl<R: Read, H> ElementSource for XmlEventReader<R, H>
where
    H: XmlSAX,
    H::Output: SpectrumBuilding,
{
    type Builder = H::Output;

    fn next_element(&mut self) -> Option<Result<Self::Builder, ScanAccessError>> {
        self.next_finished()
            .map(|res| res.map_err(ScanAccessError::parser))
    }
}

/// Read one attribute's unescaped value
pub(crate) fn attribute<'a>(
    event: &'a BytesStart,
    key: &str,
) -> Result<Option<Cow<'a, str>>, quick_xml::Error> {
    match event.try_get_attribute(key)? {
        Some(attr) => Ok(Some(attr.unescape_value()?)),
        None => Ok(None),
    }
}

/// Read and parse one attribute. A value that does not parse is logged and
/// treated as absent.
pub(crate) fn parse_attribute<T: FromStr>(
    event: &BytesStart,
    key: &str,
) -> Result<Option<T>, quick_xml::Error> {
    let Some(value) = attribute(event, key)? else {
        return Ok(None);
    };
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    match value.parse() {
        Ok(v) => Ok(Some(v)),
        Err(_) => {
            debug!("Ignoring unparsable attribute {key}={value:?}");
            Ok(None)
        }
    }
}

fn parse_accession(accession: &str, cv_label: Option<&str>) -> Option<CURIE> {
    if accession.contains(':') {
        return accession.parse().ok();
    }
    // Some documents split the vocabulary into `cvLabel` and give a bare number
    let cv = cv_label?
        .to_ascii_uppercase()
        .parse::<ControlledVocabulary>()
        .ok()?
        .as_option()?;
    match curie_to_num(&format!("{}:{accession}", cv.prefix())) {
        (Some(cv), Some(acc)) => Some(CURIE::new(cv, acc)),
        _ => None,
    }
}

/// Read a `<cvParam>` element without failing on attributes it does not know
pub(crate) fn parse_cv_param(event: &BytesStart) -> Result<CvParam<'static>, quick_xml::Error> {
    let mut name = String::new();
    let mut value = String::new();
    let mut accession = None;
    let mut cv_label = None;
    let mut unit = Unit::Unknown;

    for attr in event.attributes() {
        let attr = attr?;
        match attr.key.as_ref() {
            b"name" => name = attr.unescape_value()?.into_owned(),
            b"value" => value = attr.unescape_value()?.into_owned(),
            b"accession" => accession = Some(attr.unescape_value()?.into_owned()),
            b"cvRef" | b"cvLabel" => cv_label = Some(attr.unescape_value()?.into_owned()),
            b"unitAccession" => {
                let u = Unit::from_accession(&attr.unescape_value()?);
                if u != Unit::Unknown {
                    unit = u;
                }
            }
            b"unitName" => {
                if unit == Unit::Unknown {
                    unit = Unit::from_name(&attr.unescape_value()?);
                }
            }
            _ => {}
        }
    }
    let accession = accession
        .as_deref()
        .and_then(|acc| parse_accession(acc.trim(), cv_label.as_deref()));
    Ok(CvParam::new(
        Cow::Owned(name),
        Cow::Owned(value),
        accession,
        unit,
    ))
}

#[cfg(test)]
mod test {
    use super::*;

    fn start(text: &str) -> BytesStart<'static> {
        let mut reader = Reader::from_str(text);
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) => e.into_owned(),
            other => panic!("Unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_parse_cv_param() {
        let e = start(
            r#"<cvParam cvRef="MS" accession="MS:1000016" name="scan start time" value="5.89" unitCvRef="UO" unitAccession="UO:0000031" unitName="minute"/>"#,
        );
        let param = parse_cv_param(&e).unwrap();
        assert_eq!(param.accession, Some(crate::curie!(MS:1000016)));
        assert_eq!(param.value, "5.89");
        assert_eq!(param.unit, Unit::Minute);
    }

    #[test]
    fn test_split_accession() {
        let e = start(r#"<cvParam cvLabel="psi" accession="PSI:1000037" name="Polarity" value="Positive"/>"#);
        assert_eq!(
            parse_cv_param(&e).unwrap().accession,
            Some(crate::curie!(PSI:1000037))
        );
        let e = start(r#"<cvParam cvLabel="PSI" accession="1000038" name="TimeInMinutes" value="1.5"/>"#);
        assert_eq!(
            parse_cv_param(&e).unwrap().accession,
            Some(crate::curie!(PSI:1000038))
        );
        let e = start(r#"<cvParam name="user value" value="1.5"/>"#);
        assert_eq!(parse_cv_param(&e).unwrap().accession, None);
    }

    #[test]
    fn test_parse_attribute() {
        let e = start(r#"<scan num="5" msLevel="two" lowMz="" />"#);
        assert_eq!(parse_attribute::<u32>(&e, "num").unwrap(), Some(5));
        assert_eq!(parse_attribute::<u8>(&e, "msLevel").unwrap(), None);
        assert_eq!(parse_attribute::<f64>(&e, "lowMz").unwrap(), None);
        assert_eq!(parse_attribute::<f64>(&e, "highMz").unwrap(), None);
    }
}
