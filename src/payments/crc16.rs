// CRC16-CCITT as used by the BR Code integrity tag (63)

const POLYNOMIAL: u16 = 0x1021;
const INITIAL: u16 = 0xFFFF;

/// CRC16-CCITT (poly 0x1021, init 0xFFFF, MSB first, no final XOR)
pub fn crc16_ccitt(bytes: &[u8]) -> u16 {
    let mut crc = INITIAL;
    for &byte in bytes {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Checksum formatted the way it is appended to a payload: 4 uppercase hex digits
pub fn crc16_hex(bytes: &[u8]) -> String {
    format!("{:04X}", crc16_ccitt(bytes))
}
