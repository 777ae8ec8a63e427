use std::collections::BTreeSet;

use vulkanalia::prelude::v1_0::*;

const QUEUE_PRIORITIES: &[f32] = &[1.0];

/// Queue families found on a device while probing it. Either one
/// may be missing, in which case the device cannot be used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Looks through the queue families of a device for one that
    /// supports graphics commands and one that can present to the
    /// surface, stopping as soon as both are found.
    ///
    /// `supports_present` answers whether the family at a given
    /// index can present to the target surface.
    pub fn find<F>(
        families: &[vk::QueueFamilyProperties],
        mut supports_present: F,
    ) -> VkResult<Self>
    where
        F: FnMut(u32) -> VkResult<bool>,
    {
        let mut indices = Self::default();

        for (index, properties) in families.iter().enumerate() {
            let index = index as u32;
            if properties.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                indices.graphics = Some(index);
            }
            if supports_present(index)? {
                indices.present = Some(index);
            }
            if indices.is_complete() {
                break;
            }
        }

        Ok(indices)
    }

    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    pub fn complete(&self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics?,
            present: self.present?,
        })
    }
}

/// Queue families of the selected device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// Distinct family indices, in ascending order. A family that
    /// does both jobs appears once.
    pub fn unique(&self) -> Vec<u32> {
        [self.graphics, self.present]
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// One queue create entry per distinct family, one queue each.
    pub fn queue_create_infos(&self) -> Vec<vk::DeviceQueueCreateInfo> {
        self.unique()
            .into_iter()
            .map(|index| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(index)
                    .queue_priorities(QUEUE_PRIORITIES)
                    .build()
            })
            .collect()
    }

    /// How swapchain images are shared between the two families.
    ///
    /// When a single family does both graphics and presentation the
    /// images stay EXCLUSIVE to it and no family list is needed;
    /// otherwise they are CONCURRENT across exactly both families,
    /// which spares explicit ownership transfers.
    pub fn sharing_mode(&self) -> (vk::SharingMode, Vec<u32>) {
        if self.graphics == self.present {
            (vk::SharingMode::EXCLUSIVE, Vec::new())
        } else {
            (vk::SharingMode::CONCURRENT, vec![self.graphics, self.present])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn single_family_for_both_jobs() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER)];
        let indices = QueueFamilyIndices::find(&families, |_| Ok(true)).unwrap();

        assert_eq!(indices, QueueFamilyIndices { graphics: Some(0), present: Some(0) });

        let families = indices.complete().unwrap();
        let infos = families.queue_create_infos();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].queue_family_index, 0);
        assert_eq!(infos[0].queue_count, 1);

        let (mode, indices) = families.sharing_mode();
        assert_eq!(mode, vk::SharingMode::EXCLUSIVE);
        assert!(indices.is_empty());
    }

    #[test]
    fn separate_families_share_concurrently() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::COMPUTE),
        ];
        let indices = QueueFamilyIndices::find(&families, |i| Ok(i == 1)).unwrap();
        let families = indices.complete().unwrap();

        assert_eq!(families, QueueFamilies { graphics: 0, present: 1 });
        assert_eq!(families.queue_create_infos().len(), 2);
        assert_eq!(
            families.sharing_mode(),
            (vk::SharingMode::CONCURRENT, vec![0, 1])
        );
    }

    #[test]
    fn stops_probing_once_complete() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let mut probed = Vec::new();
        let indices = QueueFamilyIndices::find(&families, |i| {
            probed.push(i);
            Ok(true)
        })
        .unwrap();

        assert_eq!(indices.graphics, Some(0));
        assert_eq!(probed, vec![0]);
    }

    #[test]
    fn missing_present_family_is_incomplete() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let indices = QueueFamilyIndices::find(&families, |_| Ok(false)).unwrap();

        assert!(!indices.is_complete());
        assert_eq!(indices.complete(), None);
    }

    #[test]
    fn present_query_errors_propagate() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let result = QueueFamilyIndices::find(&families, |_| Err(vk::ErrorCode::SURFACE_LOST_KHR));

        assert_eq!(result, Err(vk::ErrorCode::SURFACE_LOST_KHR));
    }
}
