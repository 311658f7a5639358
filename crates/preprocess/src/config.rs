/// Square input the YOLOv8 export is traced at.
pub const DEFAULT_INPUT_SIZE: (u32, u32) = (640, 640);

/// Gray used to pad the letterbox borders.
pub const LETTERBOX_COLOR: u8 = 114;
