use crate::models::job::JobPosting;
use crate::models::profile::JobPreferences;

/// Hard preference filter applied before auto-applying.
///
/// A job passes when every configured preference is satisfied:
/// its location contains one of the preferred locations, its salary range
/// overlaps the preferred one, and its title contains one of the target
/// roles. Text comparisons ignore case. No preferences means everything passes.
pub fn matches_preferences(preferences: Option<&JobPreferences>, job: &JobPosting) -> bool {
    let Some(prefs) = preferences else {
        return true;
    };

    if !prefs.locations.is_empty() {
        let location = job.location.as_deref().unwrap_or_default().to_lowercase();
        if !contains_any(&location, &prefs.locations) {
            return false;
        }
    }

    if let (Some(wanted_min), Some(offered_max)) = (prefs.salary_min, job.salary_max) {
        if offered_max < wanted_min {
            return false;
        }
    }
    if let (Some(wanted_max), Some(offered_min)) = (prefs.salary_max, job.salary_min) {
        if offered_min > wanted_max {
            return false;
        }
    }

    if !prefs.target_roles.is_empty() && !contains_any(&job.title.to_lowercase(), &prefs.target_roles)
    {
        return false;
    }

    true
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles
        .iter()
        .map(|n| n.trim().to_lowercase())
        .filter(|n| !n.is_empty())
        .any(|n| haystack.contains(&n))
}
