//! 实验结果.

use crate::profile::Profile;
use std::io::{self, Write};

/// 将 `profile` 的结果写进 `w` 中.
fn describe_into<W: Write>(name: &str, p: &Profile, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn f64_to_display(f: Option<f64>) -> String {
        match f {
            Some(f) => format!("{f:.6}"),
            None => "/".to_string(),
        }
    }

    writeln!(w, "Crop mode `{name}`:")?;
    writeln!(w, "{S4}Samples: {}", p.get_samples())?;
    writeln!(w, "{S4}Empty source labels: {}", p.get_trivial())?;
    writeln!(w, "{S4}Patches missing all foreground: {}", p.get_missed())?;
    writeln!(
        w,
        "{S4}Foreground coverage: {}",
        f64_to_display(p.get_coverage())
    )?;
    writeln!(w, "{S4}Total crop time: {} us", p.get_crop_time_us())?;
    writeln!(
        w,
        "{S4}Average crop time: {} us",
        f64_to_display(p.get_avg_crop_time_us())
    )?;
    writeln!(w, "{S4}Total machine time: {} us", p.get_real_time_us())?;
    let t = p.get_most_time_consuming().map(|d| d.as_micros() as f64);
    write!(w, "{S4}Slowest crop costs {} us", f64_to_display(t))?;
    Ok(())
}

/// 消融实验最终结果.
pub struct AblationResult {
    data: Vec<(&'static str, Profile)>,
}

impl FromIterator<(&'static str, Profile)> for AblationResult {
    fn from_iter<I: IntoIterator<Item = (&'static str, Profile)>>(it: I) -> Self {
        Self {
            data: it.into_iter().collect(),
        }
    }
}

impl AblationResult {
    /// 将运行结果写进 `w` 中.
    pub fn analyze_into<W: Write>(&self, mut w: W) -> io::Result<()> {
        utils::sep_to(&mut w)?;
        for (key, profile) in self.data.iter() {
            describe_into(key, profile, &mut w)?;
            writeln!(w)?;
            utils::sep_to(&mut w)?;
        }
        Ok(())
    }

    /// 在标准输出上分析运行结果.
    pub fn analyze(&self) -> io::Result<()> {
        self.analyze_into(io::stdout().lock())
    }
}

#[cfg(test)]
mod tests {
    use super::AblationResult;
    use crate::profile::Profile;

    #[test]
    fn test_analyze_lists_every_mode() {
        let mut p = Profile::new();
        p.count_sample(3, 4);
        let r: AblationResult = [("random", p.clone()), ("centroid", p)].into_iter().collect();
        let mut buf = Vec::new();
        r.analyze_into(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Crop mode `random`"));
        assert!(text.contains("Crop mode `centroid`"));
        assert!(text.contains("Foreground coverage: 0.750000"));
    }
}
