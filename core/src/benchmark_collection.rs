//! Parsing of `scene(:option=value)*` benchmark descriptions.

use crate::benchmark::{Benchmark, OptionPair};
use crate::util;

/// Benchmarks shipped for runs where no normal scene was requested.
pub const DEFAULT_BENCHMARKS: &[&str] = &["clear:color=cycle", "clear:color=1.0,1.0,1.0,1.0"];

fn name_from_description(description: &str) -> &str {
    util::split(description, ':').first().copied().unwrap_or("")
}

fn options_from_description(description: &str) -> Vec<OptionPair> {
    let elems = util::split(description, ':');

    elems
        .iter()
        .skip(1)
        .filter_map(|segment| match util::split(segment, '=').as_slice() {
            [name, value] => Some((name.to_string(), value.to_string())),
            _ => {
                log::warn!(
                    "Ignoring invalid option string '{}' in benchmark description",
                    segment
                );
                None
            }
        })
        .collect()
}

/// Parse one benchmark description into a scene name and its overrides.
pub fn parse_description(description: &str) -> (String, Vec<OptionPair>) {
    (
        name_from_description(description).to_string(),
        options_from_description(description),
    )
}

/// An ordered list of benchmarks built from descriptions.
#[derive(Debug, Default, Clone)]
pub struct BenchmarkCollection {
    benchmarks: Vec<Benchmark>,
    contains_normal_scenes: bool,
}

impl BenchmarkCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one benchmark per description, duplicates included. Scene names
    /// are resolved when each benchmark runs.
    pub fn add<S: AsRef<str>>(&mut self, descriptions: &[S]) {
        for description in descriptions {
            let (scene_name, options) = parse_description(description.as_ref());
            if !scene_name.is_empty() {
                self.contains_normal_scenes = true;
            }
            self.benchmarks.push(Benchmark::new(scene_name, options));
        }
    }

    pub fn benchmarks(&self) -> &[Benchmark] {
        &self.benchmarks
    }

    /// Whether any description named a scene other than the option-setting
    /// pseudo-scene.
    pub fn contains_normal_scenes(&self) -> bool {
        self.contains_normal_scenes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn pairs(list: &[(&str, &str)]) -> Vec<OptionPair> {
        list.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[rstest]
    #[case::name_only("clear", "clear", &[])]
    #[case::two_options(
        "scene1:opt1=val1:opt2=val2",
        "scene1",
        &[("opt1", "val1"), ("opt2", "val2")]
    )]
    #[case::bad_segment_dropped("scene1:badsegment:opt=v", "scene1", &[("opt", "v")])]
    #[case::too_many_equals("s:a=b=c", "s", &[])]
    #[case::trailing_colon("s:", "s", &[])]
    #[case::empty_value("s:a=", "s", &[("a", "")])]
    #[case::pseudo_scene(":duration=5", "", &[("duration", "5")])]
    #[case::color_with_commas("clear:color=1.0,0.5", "clear", &[("color", "1.0,0.5")])]
    #[case::empty("", "", &[])]
    fn test_parse_description(
        #[case] description: &str,
        #[case] name: &str,
        #[case] options: &[(&str, &str)],
    ) {
        let (parsed_name, parsed_options) = parse_description(description);
        assert_eq!(parsed_name, name);
        assert_eq!(parsed_options, pairs(options));
    }

    #[test]
    fn test_add_keeps_duplicates_in_order() {
        let mut bc = BenchmarkCollection::new();
        bc.add(&["clear:color=cycle", "clear", "nope"]);

        let names: Vec<_> = bc.benchmarks().iter().map(|b| b.scene_name()).collect();
        assert_eq!(names, ["clear", "clear", "nope"]);
        assert!(bc.contains_normal_scenes());
    }

    #[test]
    fn test_only_pseudo_scenes_are_not_normal() {
        let mut bc = BenchmarkCollection::new();
        bc.add(&[":duration=1", ":duration=2"]);
        assert_eq!(bc.benchmarks().len(), 2);
        assert!(!bc.contains_normal_scenes());

        bc.add(DEFAULT_BENCHMARKS);
        assert!(bc.contains_normal_scenes());
    }
}
