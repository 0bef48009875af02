use uuid::Uuid;

/**
 * How long (milliseconds) to wait before looking for the prop again.
 */
pub const CONNECT_DELAY: u64 = 1000;

/**
 * How long (milliseconds) a single discovery run lasts before it is restarted.
 */
pub const DISCOVERY_WINDOW: u64 = 10000;

/**
 * How long (milliseconds) opening the serial stream may take.
 */
pub const CONNECT_DEADLINE: u64 = 10000;

/**
 * How long (milliseconds) writing a single command may take.
 */
pub const WRITE_DEADLINE: u64 = 2000;

/**
 * How often (milliseconds) a connected link is checked for a vanished peer.
 */
pub const POLL_DELAY: u64 = 1000;

/**
 * How long (milliseconds) a single connection check may take.
 */
pub const IS_CONNECTED_DEADLINE: u64 = 2000;

/**
 * The Serial Port Profile service class, offered by the SPP server of the firmware.
 */
pub const SERIAL_PORT_SERVICE: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805f9b34fb);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_port_service_uuid() {
        assert_eq!(SERIAL_PORT_SERVICE.to_string(), "00001101-0000-1000-8000-00805f9b34fb");
    }
}
