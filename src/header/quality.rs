//! Quality values (`q`, `qs`) in parts per thousand and the orderings
//! built on them.
use std::cmp::Ordering;

/// Quality of a value that carries no `q` parameter.
pub const DEFAULT_QUALITY: u16 = 1000;
pub const MINIMUM_QUALITY: u16 = 0;

/// A header value weighted by a quality factor.
pub trait Qualified {
    fn quality(&self) -> u16;
}

/// Higher quality first.
pub fn compare_quality<T: Qualified>(a: &T, b: &T) -> Ordering {
    b.quality().cmp(&a.quality())
}

/// Stable sort, highest quality first, ties broken by `tie`.
pub fn sort_qualified<T, F>(list: &mut [T], tie: F)
where
    T: Qualified,
    F: Fn(&T, &T) -> Ordering,
{
    list.sort_by(|a, b| compare_quality(a, b).then_with(|| tie(a, b)));
}

/// Render a quality for a `;q=` parameter: `0.5`, `0.125`, `0`, `1`.
pub fn format_quality(quality: u16) -> String {
    if quality >= DEFAULT_QUALITY {
        return "1".to_string();
    }
    if quality == 0 {
        return "0".to_string();
    }
    let decimals = format!("{:03}", quality);
    format!("0.{}", decimals.trim_end_matches('0'))
}

#[cfg(test)]
mod test {
    use super::*;

    struct Q(&'static str, u16);

    impl Qualified for Q {
        fn quality(&self) -> u16 {
            self.1
        }
    }

    #[test]
    fn test_sort_is_stable() {
        let mut list = vec![Q("a", 500), Q("b", 1000), Q("c", 500), Q("d", 1000)];
        sort_qualified(&mut list, |_, _| Ordering::Equal);
        let names: Vec<&str> = list.iter().map(|q| q.0).collect();
        assert_eq!(names, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_format_quality() {
        assert_eq!(format_quality(1000), "1");
        assert_eq!(format_quality(500), "0.5");
        assert_eq!(format_quality(125), "0.125");
        assert_eq!(format_quality(50), "0.05");
        assert_eq!(format_quality(0), "0");
    }
}
