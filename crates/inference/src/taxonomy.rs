/// Which stats bucket a detection falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskClass {
    Masked,
    Unmasked,
    Incorrect,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassInfo {
    pub class: MaskClass,
    pub label: &'static str,
    pub color: &'static str,
}

pub const UNKNOWN_CLASS: ClassInfo = ClassInfo {
    class: MaskClass::Unknown,
    label: "Unknown",
    color: "#888888",
};

/// Indexed by the class id the detector was trained with.
const CLASSES: [ClassInfo; 3] = [
    ClassInfo {
        class: MaskClass::Masked,
        label: "Maskeli",
        color: "#22C55E",
    },
    ClassInfo {
        class: MaskClass::Unmasked,
        label: "Maskesiz",
        color: "#EF4444",
    },
    ClassInfo {
        class: MaskClass::Incorrect,
        label: "Hatalı Maske",
        color: "#F59E0B",
    },
];

/// Ids outside the trained set resolve to [`UNKNOWN_CLASS`].
pub fn lookup(class_id: u32) -> ClassInfo {
    CLASSES
        .get(class_id as usize)
        .copied()
        .unwrap_or(UNKNOWN_CLASS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_classes() {
        assert_eq!(lookup(0).label, "Maskeli");
        assert_eq!(lookup(0).color, "#22C55E");
        assert_eq!(lookup(0).class, MaskClass::Masked);

        assert_eq!(lookup(1).label, "Maskesiz");
        assert_eq!(lookup(1).color, "#EF4444");
        assert_eq!(lookup(1).class, MaskClass::Unmasked);

        assert_eq!(lookup(2).label, "Hatalı Maske");
        assert_eq!(lookup(2).color, "#F59E0B");
        assert_eq!(lookup(2).class, MaskClass::Incorrect);
    }

    #[test]
    fn test_out_of_range_ids_are_unknown() {
        for id in [3, 17, u32::MAX] {
            assert_eq!(lookup(id), UNKNOWN_CLASS, "Class {} should be unknown", id);
        }
    }
}
