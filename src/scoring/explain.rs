use crate::scoring::QualityCategory;

pub fn stability_text(project: &str, category: QualityCategory) -> String {
    match category {
        QualityCategory::High => format!(
            "{project} has highly stable revenue, with quarter-over-quarter growth consistently \
             within ±20%. This indicates reliable and predictable earnings."
        ),
        QualityCategory::Moderate => format!(
            "{project} has moderately stable revenue, but some quarters showed growth fluctuations \
             exceeding ±20%. This suggests some inconsistency in earnings."
        ),
        QualityCategory::Low => format!(
            "{project} has unstable revenue, with significant quarter-over-quarter growth \
             fluctuations exceeding ±20%. This indicates unpredictable earnings."
        ),
    }
}

pub fn magnitude_text(category: QualityCategory) -> &'static str {
    match category {
        QualityCategory::High => {
            "The project generates a high volume of revenue compared to others, placing it among \
             the top earners in its sector."
        }
        QualityCategory::Moderate => {
            "The project generates a moderate volume of revenue, performing averagely compared to \
             other projects."
        }
        QualityCategory::Low => {
            "The project generates a low volume of revenue compared to others, indicating a \
             smaller scale of operations."
        }
    }
}

pub fn overall_text(project: &str, category: QualityCategory) -> String {
    match category {
        QualityCategory::High => format!(
            "Overall, {project} has high-quality earnings, combining strong revenue volume with \
             consistent growth. This suggests a robust and sustainable revenue stream."
        ),
        QualityCategory::Moderate => format!(
            "Overall, {project} has moderate-quality earnings. While it may have decent revenue \
             volume, inconsistent growth impacts its sustainability."
        ),
        QualityCategory::Low => format!(
            "Overall, {project} has low-quality earnings, likely due to a combination of low \
             revenue volume and inconsistent growth. This suggests challenges in maintaining \
             sustainable revenue."
        ),
    }
}
