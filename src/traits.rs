const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];

pub trait HumanSize {
    fn human_size(&self) -> String;
}

impl HumanSize for u64 {
    fn human_size(&self) -> String {
        if *self < 1024 {
            return format!("{self} B");
        }

        let mut size = *self as f64 / 1024.0;
        let mut unit = UNITS[0];

        for next in &UNITS[1..] {
            if size < 1024.0 {
                break;
            }

            size /= 1024.0;
            unit = next;
        }

        format!("{size:.1} {unit}")
    }
}
