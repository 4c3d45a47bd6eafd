//! Longest-prefix-match routing table.

use std::net::Ipv4Addr;

use crate::error::NetError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cidr {
    pub network: Ipv4Addr,
    pub prefix_len: u8,
}

impl Cidr {
    pub fn new(network: Ipv4Addr, prefix_len: u8) -> Self {
        Self { network, prefix_len }
    }

    fn mask(&self) -> u32 {
        if self.prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - self.prefix_len)
        }
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let mask = self.mask();
        (u32::from(ip) & mask) == (u32::from(self.network) & mask)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub destination: Cidr,
    pub gateway: Option<Ipv4Addr>,
    pub interface: String,
    pub metric: u32,
    pub valid: bool,
    pub preferred: bool,
}

/// A plain list of routes. `lookup` picks the valid route with the longest
/// prefix match, breaking ties by lower metric then preferred flag.
#[derive(Default)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(&mut self, route: Route) -> Result<(), NetError> {
        if self
            .routes
            .iter()
            .any(|r| r.destination == route.destination)
        {
            return Err(NetError::RouteExists(format!(
                "{}/{}",
                route.destination.network, route.destination.prefix_len
            )));
        }
        self.routes.push(route);
        Ok(())
    }

    pub fn remove_route(&mut self, destination: &Cidr) -> Result<(), NetError> {
        let before = self.routes.len();
        self.routes.retain(|r| &r.destination != destination);
        if self.routes.len() == before {
            return Err(NetError::RouteNotFound);
        }
        Ok(())
    }

    pub fn lookup(&self, ip: Ipv4Addr) -> Option<&Route> {
        self.routes
            .iter()
            .filter(|r| r.valid && r.destination.contains(ip))
            .max_by(|a, b| {
                a.destination
                    .prefix_len
                    .cmp(&b.destination.prefix_len)
                    .then_with(|| b.metric.cmp(&a.metric))
                    .then_with(|| a.preferred.cmp(&b.preferred))
            })
    }

    pub fn default_route(&self) -> Option<&Route> {
        self.routes
            .iter()
            .find(|r| r.valid && r.destination.prefix_len == 0)
    }

    pub fn stats(&self) -> RouteStats {
        RouteStats {
            total: self.routes.len(),
            valid: self.routes.iter().filter(|r| r.valid).count(),
            default: self
                .routes
                .iter()
                .filter(|r| r.valid && r.destination.prefix_len == 0)
                .count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteStats {
    pub total: usize,
    pub valid: usize,
    pub default: usize,
}
