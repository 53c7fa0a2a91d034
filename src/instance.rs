use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::bitset::{CoverSet, MAX_LOCATIONS};
use crate::errors::SolverError;

/// Action context attached to the endpoints of a distance query. The truck
/// metric ignores these; the drone metric uses them to apply visit rules.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Action {
    Departure,
    Visit,
    Arrival,
    Undefined,
}

/// A single location of an instance. Index 0 is always the depot. Equality
/// is by index only, so reordering-insensitive containers behave.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Location {
    pub index: usize,
    pub name: String,
    pub x: f64,
    pub y: f64,
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for Location {}

/// Drone-restriction rules layered over an inner distance.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Restriction {
    /// Maximum cumulative flight per operation; `f64::INFINITY` disables it.
    pub max_fly: f64,
    /// The drone cannot depart from, arrive at, or visit these.
    pub forbidden: CoverSet,
    /// The drone cannot visit these but may launch from or land at them.
    pub no_visit: CoverSet,
}

impl Default for Restriction {
    fn default() -> Self {
        Restriction {
            max_fly: f64::INFINITY,
            forbidden: CoverSet::EMPTY,
            no_visit: CoverSet::EMPTY,
        }
    }
}

impl Restriction {
    pub fn is_unrestricted(&self) -> bool {
        self.max_fly.is_infinite() && self.forbidden.is_empty() && self.no_visit.is_empty()
    }
}

/// A pairwise metric. Variants cover the three instance sources plus the
/// restriction overlay; every call site dispatches through [`Distance::leg`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum Distance {
    Matrix(Vec<Vec<f64>>),
    Euclidean {
        x: Vec<f64>,
        y: Vec<f64>,
        speed: f64,
    },
    Restricted {
        inner: Box<Distance>,
        rules: Restriction,
    },
}

impl Distance {
    /// One leg with full action context. `prior` is the cumulative length
    /// already flown when this leg starts; restrictions compare `prior +
    /// leg` against the range. Violations return `f64::INFINITY`.
    pub fn leg(&self, from: usize, to: usize, from_action: Action, to_action: Action, prior: f64) -> f64 {
        match self {
            Self::Matrix(matrix) => matrix[from][to],
            Self::Euclidean { x, y, speed } => {
                let dx = x[from] - x[to];
                let dy = y[from] - y[to];
                let distance = dx.hypot(dy);
                if distance == 0.0 { 0.0 } else { distance / speed }
            }
            Self::Restricted { inner, rules } => {
                if rules.forbidden.contains(from) || rules.forbidden.contains(to) {
                    return f64::INFINITY;
                }
                if (from_action == Action::Visit && rules.no_visit.contains(from))
                    || (to_action == Action::Visit && rules.no_visit.contains(to))
                {
                    return f64::INFINITY;
                }

                let leg = inner.leg(from, to, from_action, to_action, prior);
                if prior + leg > rules.max_fly {
                    f64::INFINITY
                } else {
                    leg
                }
            }
        }
    }

    pub fn context_free(&self, from: usize, to: usize) -> f64 {
        self.leg(from, to, Action::Undefined, Action::Undefined, 0.0)
    }

    pub fn context_free_with_prior(&self, from: usize, to: usize, prior: f64) -> f64 {
        self.leg(from, to, Action::Undefined, Action::Undefined, prior)
    }

    pub fn depart_visit(&self, from: usize, to: usize) -> f64 {
        self.leg(from, to, Action::Departure, Action::Visit, 0.0)
    }

    pub fn visit_arrive(&self, from: usize, to: usize, prior: f64) -> f64 {
        self.leg(from, to, Action::Visit, Action::Arrival, prior)
    }

    pub fn depart_arrive(&self, from: usize, to: usize) -> f64 {
        self.leg(from, to, Action::Departure, Action::Arrival, 0.0)
    }

    pub fn visit_twice(&self, from: usize, to: usize, prior: f64) -> f64 {
        self.leg(from, to, Action::Visit, Action::Visit, prior)
    }

    /// Launch-visit-rendezvous triangle: the departure leg plus the arrival
    /// leg with the departure length as its prior.
    pub fn fly_distance(&self, from: usize, to: usize, fly: usize) -> f64 {
        let launch = self.depart_visit(from, fly);
        if !launch.is_finite() {
            return f64::INFINITY;
        }

        let rendezvous = self.visit_arrive(fly, to, launch);
        launch + rendezvous
    }

    /// Path cost across `start -> intermediate... -> end` with correctly
    /// tagged actions and accumulating priors.
    pub fn path_distance(&self, start: usize, end: usize, intermediate: &[usize]) -> f64 {
        let mut total = 0.0;
        let mut previous = start;
        let mut previous_action = Action::Departure;
        for &node in intermediate {
            total += self.leg(previous, node, previous_action, Action::Visit, total);
            if !total.is_finite() {
                return f64::INFINITY;
            }

            previous = node;
            previous_action = Action::Visit;
        }

        total + self.leg(previous, end, previous_action, Action::Arrival, total)
    }

    /// The largest finite single leg over all ordered pairs; feeds the
    /// range-factor constraint builder.
    pub fn max_leg(&self, n: usize) -> f64 {
        let mut max = 0.0_f64;
        for from in 0..n {
            for to in 0..n {
                if from != to {
                    let leg = self.context_free(from, to);
                    if leg.is_finite() {
                        max = max.max(leg);
                    }
                }
            }
        }

        max
    }

    fn unrestricted(&self) -> &Distance {
        match self {
            Self::Restricted { inner, .. } => inner.unrestricted(),
            _ => self,
        }
    }
}

/// Which text format an instance was read from; serialization mirrors it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum InstanceKind {
    Geometric,
    Graph,
    Matrix,
}

/// An immutable routing instance: ordered locations, a truck metric and a
/// drone metric. Restricted instances carry the overlay rules and wrap the
/// drone metric accordingly.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Instance {
    pub locations: Vec<Location>,
    pub kind: InstanceKind,
    drive: Distance,
    fly: Distance,
    restriction: Option<Restriction>,
    drive_speed: f64,
    fly_speed: f64,
}

impl Instance {
    pub fn geometric(
        names: Vec<String>,
        x: Vec<f64>,
        y: Vec<f64>,
        drive_speed: f64,
        fly_speed: f64,
    ) -> Result<Instance, SolverError> {
        let n = names.len();
        Self::check_size(n)?;
        if x.len() != n || y.len() != n {
            return Err(SolverError::invalid("coordinate arrays disagree on length"));
        }
        if drive_speed <= 0.0 {
            return Err(SolverError::invalid("drive speed must be positive"));
        }
        if fly_speed < 0.0 {
            return Err(SolverError::invalid("fly speed must be non-negative"));
        }

        let locations = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| Location {
                index,
                name: sanitize_name(&name),
                x: x[index],
                y: y[index],
            })
            .collect::<Vec<Location>>();

        let drive = Distance::Euclidean {
            x: locations.iter().map(|l| l.x).collect(),
            y: locations.iter().map(|l| l.y).collect(),
            speed: drive_speed,
        };
        let fly = Distance::Euclidean {
            x: locations.iter().map(|l| l.x).collect(),
            y: locations.iter().map(|l| l.y).collect(),
            speed: fly_speed,
        };

        Ok(Instance {
            locations,
            kind: InstanceKind::Geometric,
            drive,
            fly,
            restriction: None,
            drive_speed,
            fly_speed,
        })
    }

    pub fn from_matrices(
        drive: Vec<Vec<f64>>,
        fly: Vec<Vec<f64>>,
        kind: InstanceKind,
    ) -> Result<Instance, SolverError> {
        let n = drive.len();
        Self::check_size(n)?;
        if fly.len() != n
            || drive.iter().any(|row| row.len() != n)
            || fly.iter().any(|row| row.len() != n)
        {
            return Err(SolverError::invalid("distance matrices must be n x n"));
        }

        let locations = (0..n)
            .map(|index| Location {
                index,
                name: format!("n{index}"),
                x: 0.0,
                y: 0.0,
            })
            .collect();

        Ok(Instance {
            locations,
            kind,
            drive: Distance::Matrix(drive),
            fly: Distance::Matrix(fly),
            restriction: None,
            drive_speed: 1.0,
            fly_speed: 1.0,
        })
    }

    fn check_size(n: usize) -> Result<(), SolverError> {
        if n < 1 {
            return Err(SolverError::invalid("an instance needs at least a depot"));
        }
        if n > MAX_LOCATIONS {
            return Err(SolverError::InstanceTooLarge {
                locations: n,
                limit: MAX_LOCATIONS,
            });
        }

        Ok(())
    }

    pub fn n(&self) -> usize {
        self.locations.len()
    }

    pub fn depot(&self) -> usize {
        0
    }

    pub fn is_depot(&self, index: usize) -> bool {
        index == 0
    }

    pub fn drive(&self) -> &Distance {
        &self.drive
    }

    pub fn fly(&self) -> &Distance {
        &self.fly
    }

    pub fn restriction(&self) -> Option<&Restriction> {
        self.restriction.as_ref()
    }

    /// Wrap the drone metric with restriction rules, yielding a restricted
    /// instance with the same capability surface.
    #[must_use]
    pub fn restrict(&self, rules: Restriction) -> Instance {
        let mut restricted = self.clone();
        restricted.fly = Distance::Restricted {
            inner: Box::new(self.fly.unrestricted().clone()),
            rules: rules.clone(),
        };
        restricted.restriction = Some(rules);
        restricted
    }

    /// Extract the sub-instance of locations matching `predicate`. The depot
    /// is always kept; distances become matrix lookups and restriction sets
    /// are remapped to the surviving indices.
    pub fn sub_instance<F: Fn(&Location) -> bool>(&self, predicate: F) -> Result<Instance, SolverError> {
        let kept: Vec<usize> = self
            .locations
            .iter()
            .filter(|l| l.index == 0 || predicate(l))
            .map(|l| l.index)
            .collect();

        let drive_inner = self.drive.unrestricted();
        let fly_inner = self.fly.unrestricted();
        let extract = |metric: &Distance| {
            kept.iter()
                .map(|&from| kept.iter().map(|&to| metric.context_free(from, to)).collect())
                .collect::<Vec<Vec<f64>>>()
        };

        let mut instance = Self::from_matrices(extract(drive_inner), extract(fly_inner), InstanceKind::Matrix)?;
        for (new_index, &old_index) in kept.iter().enumerate() {
            instance.locations[new_index].name = self.locations[old_index].name.clone();
        }

        if let Some(rules) = &self.restriction {
            let mut remapped = Restriction {
                max_fly: rules.max_fly,
                ..Restriction::default()
            };
            for (new_index, &old_index) in kept.iter().enumerate() {
                if rules.forbidden.contains(old_index) {
                    remapped.forbidden = remapped.forbidden.insert(new_index);
                }
                if rules.no_visit.contains(old_index) {
                    remapped.no_visit = remapped.no_visit.insert(new_index);
                }
            }

            instance = instance.restrict(remapped);
        }

        Ok(instance)
    }
}

static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());
static NON_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").unwrap());

/// Replace every `/* ... */` block with a space; shared with the solution
/// file reader.
pub(crate) fn strip_comments(text: &str) -> String {
    COMMENT.replace_all(text, " ").into_owned()
}

fn sanitize_name(name: &str) -> String {
    NON_IDENTIFIER.replace_all(name, "_").into_owned()
}

struct Tokens {
    tokens: Vec<String>,
    cursor: usize,
}

impl Tokens {
    fn next(&mut self) -> Result<&str, SolverError> {
        let token = self
            .tokens
            .get(self.cursor)
            .ok_or_else(|| SolverError::invalid("unexpected end of file"))?;
        self.cursor += 1;
        Ok(token)
    }

    fn next_f64(&mut self) -> Result<f64, SolverError> {
        let token = self.next()?;
        token
            .parse::<f64>()
            .map_err(|_| SolverError::invalid(format!("expected a number, found {token:?}")))
    }

    fn next_usize(&mut self) -> Result<usize, SolverError> {
        let token = self.next()?;
        token
            .parse::<usize>()
            .map_err(|_| SolverError::invalid(format!("expected an integer, found {token:?}")))
    }

    fn next_bool(&mut self) -> Result<bool, SolverError> {
        let token = self.next()?;
        token
            .parse::<bool>()
            .map_err(|_| SolverError::invalid(format!("expected true or false, found {token:?}")))
    }
}

/// Strip `/* ... */` comments, split off the restricted-overlay prefix
/// lines, and tokenize the remainder.
fn tokenize(text: &str) -> Result<(Option<Restriction>, Tokens), SolverError> {
    let stripped = COMMENT.replace_all(text, " ");

    let mut rules = Restriction::default();
    let mut overlay = false;
    let mut body = String::new();
    let mut in_prefix = true;
    for line in stripped.lines() {
        let trimmed = line.trim();
        if in_prefix && trimmed.starts_with('#') {
            let mut parts = trimmed.split_whitespace();
            let keyword = parts.next().unwrap_or_default();
            let value = parts
                .next()
                .ok_or_else(|| SolverError::invalid(format!("{keyword} needs a value")))?;
            match keyword {
                "#MAXFLY" => {
                    rules.max_fly = value
                        .parse::<f64>()
                        .map_err(|_| SolverError::invalid(format!("bad #MAXFLY value {value:?}")))?;
                }
                "#FORBID" => {
                    let index = parse_overlay_index(value)?;
                    rules.forbidden = rules.forbidden.insert(index);
                }
                "#NOVISIT" => {
                    let index = parse_overlay_index(value)?;
                    rules.no_visit = rules.no_visit.insert(index);
                }
                _ => return Err(SolverError::invalid(format!("unknown overlay line {trimmed:?}"))),
            }

            overlay = true;
        } else {
            if !trimmed.is_empty() {
                in_prefix = false;
            }

            body.push_str(line);
            body.push('\n');
        }
    }

    let tokens = Tokens {
        tokens: body.split_whitespace().map(str::to_owned).collect(),
        cursor: 0,
    };
    Ok((overlay.then_some(rules), tokens))
}

fn parse_overlay_index(value: &str) -> Result<usize, SolverError> {
    let index = value
        .parse::<usize>()
        .map_err(|_| SolverError::invalid(format!("bad overlay index {value:?}")))?;
    if index >= MAX_LOCATIONS {
        return Err(SolverError::invalid(format!("overlay index {index} out of range")));
    }

    Ok(index)
}

pub fn read_geometric(text: &str) -> Result<Instance, SolverError> {
    let (rules, mut tokens) = tokenize(text)?;
    let instance = parse_geometric(&mut tokens)?;
    Ok(apply_overlay(instance, rules))
}

pub fn read_graph(text: &str) -> Result<Instance, SolverError> {
    let (rules, mut tokens) = tokenize(text)?;
    let instance = parse_graph(&mut tokens)?;
    Ok(apply_overlay(instance, rules))
}

pub fn read_matrix(text: &str) -> Result<Instance, SolverError> {
    let (rules, mut tokens) = tokenize(text)?;
    let instance = parse_matrix(&mut tokens)?;
    Ok(apply_overlay(instance, rules))
}

pub fn read_file(path: &Path, kind: InstanceKind) -> Result<Instance, SolverError> {
    let text = fs::read_to_string(path)?;
    match kind {
        InstanceKind::Geometric => read_geometric(&text),
        InstanceKind::Graph => read_graph(&text),
        InstanceKind::Matrix => read_matrix(&text),
    }
}

fn apply_overlay(instance: Instance, rules: Option<Restriction>) -> Instance {
    match rules {
        Some(rules) => instance.restrict(rules),
        None => instance,
    }
}

fn parse_geometric(tokens: &mut Tokens) -> Result<Instance, SolverError> {
    let drive_speed = tokens.next_f64()?;
    let fly_speed = tokens.next_f64()?;
    let n = tokens.next_usize()?;

    let mut names = vec![];
    let mut x = vec![];
    let mut y = vec![];
    for _ in 0..n {
        x.push(tokens.next_f64()?);
        y.push(tokens.next_f64()?);
        names.push(tokens.next()?.to_owned());
    }

    Instance::geometric(names, x, y, drive_speed, fly_speed)
}

fn parse_graph(tokens: &mut Tokens) -> Result<Instance, SolverError> {
    let n = tokens.next_usize()?;
    Instance::check_size(n)?;
    let bidirectional = tokens.next_bool()?;

    let mut drive = vec![vec![f64::INFINITY; n]; n];
    let mut fly = vec![vec![f64::INFINITY; n]; n];
    for i in 0..n {
        drive[i][i] = 0.0;
        fly[i][i] = 0.0;
    }

    while tokens.cursor < tokens.tokens.len() {
        let from = tokens.next_usize()?;
        let to = tokens.next_usize()?;
        if from >= n || to >= n {
            return Err(SolverError::invalid(format!("edge {from} -> {to} out of range")));
        }

        let drive_value = tokens.next_f64()?;
        let fly_value = tokens.next_f64()?;
        drive[from][to] = drive[from][to].min(drive_value);
        fly[from][to] = fly[from][to].min(fly_value);
        if bidirectional {
            drive[to][from] = drive[to][from].min(drive_value);
            fly[to][from] = fly[to][from].min(fly_value);
        }
    }

    floyd_warshall(&mut drive);
    floyd_warshall(&mut fly);
    Instance::from_matrices(drive, fly, InstanceKind::Graph)
}

fn parse_matrix(tokens: &mut Tokens) -> Result<Instance, SolverError> {
    let n = tokens.next_usize()?;
    Instance::check_size(n)?;

    let mut read = |tokens: &mut Tokens| -> Result<Vec<Vec<f64>>, SolverError> {
        let mut matrix = vec![];
        for _ in 0..n {
            let mut row = vec![];
            for _ in 0..n {
                row.push(tokens.next_f64()?);
            }
            matrix.push(row);
        }
        Ok(matrix)
    };

    let drive = read(tokens)?;
    let fly = read(tokens)?;
    Instance::from_matrices(drive, fly, InstanceKind::Matrix)
}

/// All-pairs shortest paths, completing the sparse edge list into a full
/// matrix before any distance query runs.
fn floyd_warshall(matrix: &mut [Vec<f64>]) {
    let n = matrix.len();
    for k in 0..n {
        for i in 0..n {
            if !matrix[i][k].is_finite() {
                continue;
            }

            for j in 0..n {
                let through = matrix[i][k] + matrix[k][j];
                if through < matrix[i][j] {
                    matrix[i][j] = through;
                }
            }
        }
    }
}

/// Canonical text rendering of an instance, including the restricted
/// overlay prefix. `parse(serialize(parse(text)))` serializes byte-equal.
pub fn serialize(instance: &Instance) -> String {
    let mut out = String::new();
    if let Some(rules) = &instance.restriction {
        if rules.max_fly.is_finite() {
            let _ = writeln!(out, "#MAXFLY {}", rules.max_fly);
        }
        for index in rules.forbidden.indices() {
            let _ = writeln!(out, "#FORBID {index}");
        }
        for index in rules.no_visit.indices() {
            let _ = writeln!(out, "#NOVISIT {index}");
        }
    }

    match instance.kind {
        InstanceKind::Geometric => {
            let _ = writeln!(out, "{}", instance.drive_speed);
            let _ = writeln!(out, "{}", instance.fly_speed);
            let _ = writeln!(out, "{}", instance.n());
            for location in &instance.locations {
                let _ = writeln!(out, "{} {} {}", location.x, location.y, location.name);
            }
        }
        InstanceKind::Graph => {
            let _ = writeln!(out, "{}", instance.n());
            let _ = writeln!(out, "false");
            let drive = instance.drive.unrestricted();
            let fly = instance.fly.unrestricted();
            for from in 0..instance.n() {
                for to in 0..instance.n() {
                    if from == to {
                        continue;
                    }

                    let drive_value = drive.context_free(from, to);
                    let fly_value = fly.context_free(from, to);
                    if drive_value.is_finite() || fly_value.is_finite() {
                        let _ = writeln!(out, "{from} {to} {drive_value} {fly_value}");
                    }
                }
            }
        }
        InstanceKind::Matrix => {
            let _ = writeln!(out, "{}", instance.n());
            for metric in [instance.drive.unrestricted(), instance.fly.unrestricted()] {
                for from in 0..instance.n() {
                    let row = (0..instance.n())
                        .map(|to| metric.context_free(from, to).to_string())
                        .collect::<Vec<String>>()
                        .join(" ");
                    let _ = writeln!(out, "{row}");
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::{Action, InstanceKind, Restriction, read_geometric, read_graph, read_matrix, serialize};
    use crate::bitset::CoverSet;

    const LINE: &str = "1\n2\n3\n0 0 depot\n-1 0 left\n1 0 right\n";

    #[test]
    fn geometric_parse_and_distances() {
        let instance = read_geometric(LINE).unwrap();
        assert_eq!(instance.n(), 3);
        assert!(instance.is_depot(0));
        assert_eq!(instance.locations[1].name, "left");
        assert_eq!(instance.drive().context_free(1, 2), 2.0);
        assert_eq!(instance.fly().context_free(1, 2), 1.0);
    }

    #[test]
    fn comments_are_stripped_and_names_sanitized() {
        let text = "/* speeds */ 1\n1\n2\n0 0 the/*x*/depot\n1 1 a-b.c\n";
        let instance = read_geometric(text).unwrap();
        assert_eq!(instance.locations[0].name, "thedepot");
        assert_eq!(instance.locations[1].name, "a_b_c");
    }

    #[test]
    fn geometric_round_trip_is_byte_stable() {
        let once = serialize(&read_geometric(LINE).unwrap());
        let twice = serialize(&read_geometric(&once).unwrap());
        assert_eq!(once, twice);
    }

    #[test]
    fn graph_completes_with_shortest_paths() {
        let text = "3\ntrue\n0 1 1 1\n1 2 1 1\n";
        let instance = read_graph(text).unwrap();
        assert_eq!(instance.drive().context_free(0, 2), 2.0);
        assert_eq!(instance.drive().context_free(2, 0), 2.0);

        let once = serialize(&instance);
        let twice = serialize(&read_graph(&once).unwrap());
        assert_eq!(once, twice);
    }

    #[test]
    fn matrix_round_trip_is_byte_stable() {
        let text = "2\n0 3\n3 0\n0 1\n1 0\n";
        let instance = read_matrix(text).unwrap();
        assert_eq!(instance.drive().context_free(0, 1), 3.0);
        assert_eq!(instance.fly().context_free(1, 0), 1.0);

        let once = serialize(&instance);
        let twice = serialize(&read_matrix(&once).unwrap());
        assert_eq!(once, twice);
    }

    #[test]
    fn overlay_parses_and_round_trips() {
        let text = format!("#MAXFLY 2.5\n#FORBID 2\n#NOVISIT 1\n{LINE}");
        let instance = read_geometric(&text).unwrap();
        let rules = instance.restriction().unwrap();
        assert_eq!(rules.max_fly, 2.5);
        assert!(rules.forbidden.contains(2));
        assert!(rules.no_visit.contains(1));

        let once = serialize(&instance);
        let twice = serialize(&read_geometric(&once).unwrap());
        assert_eq!(once, twice);
    }

    #[test]
    fn restriction_rules_map_to_infinity() {
        let instance = read_geometric(LINE).unwrap();
        let restricted = instance.restrict(Restriction {
            max_fly: 1.5,
            forbidden: CoverSet::singleton(2),
            no_visit: CoverSet::singleton(1),
        });
        let fly = restricted.fly();

        // Forbidden endpoint, in any role.
        assert!(!fly.depart_visit(2, 1).is_finite());
        assert!(!fly.visit_arrive(1, 2, 0.0).is_finite());
        // Visit at a no-visit node, while overflying it is allowed.
        assert!(!fly.depart_visit(0, 1).is_finite());
        assert!(fly.depart_arrive(1, 0).is_finite());
        assert!(fly.leg(1, 0, Action::Departure, Action::Arrival, 0.0).is_finite());
        // Cumulative range.
        assert!(!fly.context_free_with_prior(0, 1, 1.2).is_finite());
        assert!(fly.context_free_with_prior(0, 1, 0.4).is_finite());
    }

    #[test]
    fn fly_distance_chains_the_prior() {
        let instance = read_geometric(LINE).unwrap();
        assert_eq!(instance.fly().fly_distance(0, 0, 1), 1.0);

        let restricted = instance.restrict(Restriction {
            max_fly: 0.9,
            ..Restriction::default()
        });
        assert!(!restricted.fly().fly_distance(0, 0, 1).is_finite());
    }

    #[test]
    fn path_distance_tags_and_accumulates() {
        let instance = read_geometric(LINE).unwrap();
        assert_eq!(instance.drive().path_distance(1, 2, &[0]), 2.0);
        assert_eq!(instance.drive().path_distance(0, 0, &[1, 2]), 4.0);
        assert_eq!(instance.drive().path_distance(1, 1, &[]), 0.0);
    }

    #[test]
    fn visit_twice_applies_visit_rules_to_both_ends() {
        let instance = read_geometric(LINE).unwrap();
        assert_eq!(instance.fly().visit_twice(1, 2, 0.0), 1.0);

        let restricted = instance.restrict(Restriction {
            max_fly: f64::INFINITY,
            forbidden: CoverSet::EMPTY,
            no_visit: CoverSet::singleton(2),
        });
        assert!(!restricted.fly().visit_twice(1, 2, 0.0).is_finite());
        assert!(!restricted.fly().visit_twice(2, 1, 0.0).is_finite());
    }

    #[test]
    fn zero_fly_speed_means_infinite_legs() {
        let text = "1\n0\n2\n0 0 depot\n1 0 c\n";
        let instance = read_geometric(text).unwrap();
        assert!(!instance.fly().context_free(0, 1).is_finite());
        assert_eq!(instance.fly().context_free(0, 0), 0.0);
    }

    #[test]
    fn sub_instance_keeps_depot_and_remaps() {
        let instance = read_geometric(LINE).unwrap().restrict(Restriction {
            max_fly: 3.0,
            forbidden: CoverSet::EMPTY,
            no_visit: CoverSet::singleton(2),
        });
        let sub = instance.sub_instance(|l| l.index == 2).unwrap();
        assert_eq!(sub.n(), 2);
        assert_eq!(sub.kind, InstanceKind::Matrix);
        assert_eq!(sub.locations[1].name, "right");
        assert_eq!(sub.drive().context_free(0, 1), 1.0);
        assert!(sub.restriction().unwrap().no_visit.contains(1));
    }

    #[test]
    fn too_many_locations_is_rejected() {
        let mut text = String::from("1\n1\n33\n");
        for i in 0..33 {
            text.push_str(&format!("{i} 0 c{i}\n"));
        }
        assert!(read_geometric(&text).is_err());
    }
}
