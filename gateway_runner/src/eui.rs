/// Marker inserted into the middle of the hardware address, per the
/// EUI-64 mapping for 48-bit MAC addresses.
const EUI_INFIX: &str = "FFFE";

/// Renders the gateway EUI the forwarder reports upstream: the 6-byte
/// hardware address as uppercase hex with `FFFE` after the third byte.
pub fn eui48(mac: [u8; 6]) -> String {
    let hex = hex::encode_upper(mac);
    format!("{}{}{}", &hex[..6], EUI_INFIX, &hex[6..])
}
