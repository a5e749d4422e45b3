//! Region topology snapshot

use crate::region::Region;
use serde::Serialize;
use tracing::error;

/// Member lists of the major and minor regions at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossRoomTopology {
    pub major_region: String,
    pub minor_region: String,
    pub major_members: Vec<String>,
    pub minor_members: Vec<String>,
}

impl CrossRoomTopology {
    /// Query both regions for their members
    ///
    /// A region that cannot be queried is reported with no members.
    pub fn capture<R: Region + ?Sized>(major: &R, minor: &R) -> Self {
        CrossRoomTopology {
            major_region: major.name().to_string(),
            minor_region: minor.name().to_string(),
            major_members: members_of(major),
            minor_members: members_of(minor),
        }
    }
}

fn members_of<R: Region + ?Sized>(region: &R) -> Vec<String> {
    match region.members() {
        Ok(members) => members,
        Err(e) => {
            error!("Failed to list members of region {}: {:#}", region.name(), e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::MemoryRegion;

    #[test]
    fn test_capture_lists_members() {
        let major = MemoryRegion::with_members("sh", vec!["10.0.0.1:6379".into()]);
        let minor = MemoryRegion::with_members(
            "bj",
            vec!["10.1.0.1:6379".into(), "10.1.0.2:6379".into()],
        );

        let topology = CrossRoomTopology::capture(&major, &minor);
        assert_eq!(topology.major_region, "sh");
        assert_eq!(topology.major_members, vec!["10.0.0.1:6379"]);
        assert_eq!(topology.minor_members.len(), 2);

        let json = serde_json::to_value(&topology).unwrap();
        assert_eq!(json["minorRegion"], "bj");
    }

    #[test]
    fn test_unreachable_region_has_no_members() {
        let major = MemoryRegion::with_members("sh", vec!["10.0.0.1:6379".into()]);
        let minor = MemoryRegion::with_members("bj", vec!["10.1.0.1:6379".into()]);
        minor.set_failing(true);

        let topology = CrossRoomTopology::capture(&major, &minor);
        assert_eq!(topology.major_members.len(), 1);
        assert!(topology.minor_members.is_empty());
    }
}
