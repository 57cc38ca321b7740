/// Information about the SDK itself, stamped on outgoing events.
#[derive(Debug, Clone, Copy)]
pub struct SdkMetadata {
    /// SDK name. Usually, language name.
    pub name: &'static str,
    /// Version of SDK.
    pub version: &'static str,
}
