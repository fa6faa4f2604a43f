//! Local IPv4 interface enumeration for subnet-directed broadcasts.
//!
//! A limited broadcast to `255.255.255.255` only leaves through the interface
//! the OS routes it to. On a multi-homed machine (Wi-Fi plus Ethernet, or a VPN
//! adapter) hosts on the other subnets would never hear the probe. Discovery
//! therefore also sends one probe to every subnet's directed broadcast address,
//! computed as `address | !netmask`.
//!
//! [`InterfaceSource`] abstracts the OS query so tests can run with a fixed
//! interface list (or none at all).

use std::io;
use std::net::Ipv4Addr;

use if_addrs::IfAddr;

/// One IPv4 address assigned to a local interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Interface {
    pub name: String,
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub is_up: bool,
    pub is_loopback: bool,
}

impl Ipv4Interface {
    /// Directed broadcast address of this interface's subnet.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::net::Ipv4Addr;
    /// use rally_node::infrastructure::network::interfaces::Ipv4Interface;
    ///
    /// let iface = Ipv4Interface {
    ///     name: "eth0".into(),
    ///     address: Ipv4Addr::new(192, 168, 1, 20),
    ///     netmask: Ipv4Addr::new(255, 255, 255, 0),
    ///     is_up: true,
    ///     is_loopback: false,
    /// };
    /// assert_eq!(iface.broadcast_address(), Ipv4Addr::new(192, 168, 1, 255));
    /// ```
    pub fn broadcast_address(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.address) | !u32::from(self.netmask))
    }

    /// `true` for an up, non-loopback interface with a unicast address.
    pub fn is_broadcast_candidate(&self) -> bool {
        let ip = self.address;
        self.is_up
            && !self.is_loopback
            && !ip.is_loopback()
            && !ip.is_unspecified()
            && !ip.is_multicast()
            && !ip.is_broadcast()
    }
}

/// Source of the local interface list.
pub trait InterfaceSource: Send + Sync {
    /// Returns every IPv4 address assigned to a local interface.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the interface table cannot be read.
    fn ipv4_interfaces(&self) -> io::Result<Vec<Ipv4Interface>>;
}

/// Reads the interface table from the operating system.
///
/// `if-addrs` only reports interfaces that currently have an address assigned,
/// so every returned entry is treated as up.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn ipv4_interfaces(&self) -> io::Result<Vec<Ipv4Interface>> {
        let interfaces = if_addrs::get_if_addrs()?
            .into_iter()
            .filter_map(|iface| {
                let is_loopback = iface.is_loopback();
                match iface.addr {
                    IfAddr::V4(v4) => Some(Ipv4Interface {
                        name: iface.name,
                        address: v4.ip,
                        netmask: v4.netmask,
                        is_up: true,
                        is_loopback,
                    }),
                    IfAddr::V6(_) => None,
                }
            })
            .collect();
        Ok(interfaces)
    }
}

/// A fixed interface list.
#[derive(Debug, Default, Clone)]
pub struct StaticInterfaces {
    interfaces: Vec<Ipv4Interface>,
}

impl StaticInterfaces {
    pub fn new(interfaces: Vec<Ipv4Interface>) -> Self {
        Self { interfaces }
    }

    /// A machine with no network interfaces at all.
    pub fn none() -> Self {
        Self::default()
    }
}

impl InterfaceSource for StaticInterfaces {
    fn ipv4_interfaces(&self) -> io::Result<Vec<Ipv4Interface>> {
        Ok(self.interfaces.clone())
    }
}

/// Directed broadcast addresses of every candidate interface, deduplicated,
/// in interface order.
pub fn subnet_broadcast_targets(interfaces: &[Ipv4Interface]) -> Vec<Ipv4Addr> {
    let mut targets: Vec<Ipv4Addr> = Vec::new();
    for iface in interfaces.iter().filter(|i| i.is_broadcast_candidate()) {
        let target = iface.broadcast_address();
        if !targets.contains(&target) {
            targets.push(target);
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(name: &str, addr: [u8; 4], mask: [u8; 4]) -> Ipv4Interface {
        Ipv4Interface {
            name: name.to_string(),
            address: Ipv4Addr::from(addr),
            netmask: Ipv4Addr::from(mask),
            is_up: true,
            is_loopback: false,
        }
    }

    #[test]
    fn test_broadcast_address_for_slash_16() {
        let i = iface("eth0", [10, 1, 2, 3], [255, 255, 0, 0]);
        assert_eq!(i.broadcast_address(), Ipv4Addr::new(10, 1, 255, 255));
    }

    #[test]
    fn test_broadcast_address_for_slash_32_is_the_address() {
        let i = iface("tun0", [10, 8, 0, 2], [255, 255, 255, 255]);
        assert_eq!(i.broadcast_address(), Ipv4Addr::new(10, 8, 0, 2));
    }

    #[test]
    fn test_targets_skip_loopback_and_down_interfaces() {
        // Arrange
        let mut lo = iface("lo", [127, 0, 0, 1], [255, 0, 0, 0]);
        lo.is_loopback = true;
        let mut down = iface("eth1", [172, 16, 0, 4], [255, 255, 0, 0]);
        down.is_up = false;
        let up = iface("eth0", [192, 168, 1, 20], [255, 255, 255, 0]);

        // Act
        let targets = subnet_broadcast_targets(&[lo, down, up]);

        // Assert
        assert_eq!(targets, vec![Ipv4Addr::new(192, 168, 1, 255)]);
    }

    #[test]
    fn test_targets_deduplicate_shared_subnet() {
        let a = iface("eth0", [192, 168, 1, 20], [255, 255, 255, 0]);
        let b = iface("eth0:1", [192, 168, 1, 21], [255, 255, 255, 0]);
        assert_eq!(subnet_broadcast_targets(&[a, b]).len(), 1);
    }

    #[test]
    fn test_no_interfaces_yields_no_targets() {
        let none = StaticInterfaces::none();
        let list = none.ipv4_interfaces().unwrap();
        assert!(subnet_broadcast_targets(&list).is_empty());
    }

    #[test]
    fn test_system_interfaces_does_not_error() {
        // Only checks the OS call succeeds; the content depends on the machine.
        assert!(SystemInterfaces.ipv4_interfaces().is_ok());
    }
}
